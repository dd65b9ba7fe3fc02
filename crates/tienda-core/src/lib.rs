//! Shared domain types and configuration for the tienda storefront core.
//!
//! This crate is dependency-light on purpose: payload shapes, money math,
//! shipping rules, and configuration parsing live here so that both the
//! persistence layer and the HTTP surface agree on one vocabulary.

mod app_config;
mod config;
mod order_view;
mod payloads;
mod pricing;
mod shipping;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use order_view::OrderLineView;
pub use payloads::{
    descriptor_from, BillingInfo, BuyerInfo, CartLine, DeliveryMethod, OrderRequest,
    ShippingSelection, SyncProductRecord, VariantPayload, WebhookProductPayload,
};
pub use pricing::effective_price;
pub use shipping::ShippingRules;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(i32),
    #[error("unit price must not be negative")]
    NegativePrice,
    #[error("stock must not be negative, got {0}")]
    NegativeStock(i32),
    #[error("order must contain at least one item")]
    EmptyOrder,
    #[error("unknown delivery method '{0}'")]
    UnknownDeliveryMethod(String),
}
