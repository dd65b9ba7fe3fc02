//! HTTP client for the external payment gateway.
//!
//! Wraps `reqwest` with gateway-specific error handling and typed response
//! deserialization. Credentials and base URL are injected at construction;
//! nothing in this crate reads the environment.

mod client;
mod error;
mod types;

pub use client::PaymentClient;
pub use error::PaymentError;
pub use types::{PaymentStatus, PreferenceLine};
