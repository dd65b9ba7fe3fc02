//! Wire payloads shared by the integration and checkout surfaces.
//!
//! Validation here is purely structural (shape, signs, non-empty keys) and
//! runs before any persistence is touched; catalog- and stock-dependent
//! checks live in the persistence layer where they can be transactional.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ValidationError;

fn default_true() -> bool {
    true
}

/// One record of a bulk catalog sync, keyed by SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProductRecord {
    pub sku: String,
    pub external_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SyncProductRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sku.trim().is_empty() {
            return Err(ValidationError::EmptyField("sku"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if self.price < Decimal::ZERO {
            return Err(ValidationError::NegativePrice);
        }
        if self.stock < 0 {
            return Err(ValidationError::NegativeStock(self.stock));
        }
        Ok(())
    }
}

/// One variant inside a product webhook, keyed by globally-unique SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantPayload {
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock: i32,
}

impl VariantPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sku.trim().is_empty() {
            return Err(ValidationError::EmptyField("variants[].sku"));
        }
        if self.stock < 0 {
            return Err(ValidationError::NegativeStock(self.stock));
        }
        Ok(())
    }

    /// Short human descriptor used in stock error messages and emails.
    #[must_use]
    pub fn descriptor(&self) -> String {
        descriptor_from(self.size.as_deref(), self.color.as_deref(), &self.sku)
    }
}

/// Formats "size/color" when attributes are present, falling back to the SKU.
#[must_use]
pub fn descriptor_from(size: Option<&str>, color: Option<&str>, sku: &str) -> String {
    match (size, color) {
        (Some(s), Some(c)) => format!("{s} / {c}"),
        (Some(s), None) => s.to_string(),
        (None, Some(c)) => c.to_string(),
        (None, None) => sku.to_string(),
    }
}

/// Authoritative single-product push from the management platform.
///
/// `variants` distinguishes "simple product" from "empty variant set":
/// `None` (field omitted) leaves existing variants untouched, while
/// `Some(list)` — including `Some([])` — is the complete desired set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookProductPayload {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub images: Option<Vec<String>>,
    pub category: Option<String>,
    pub variants: Option<Vec<VariantPayload>>,
}

impl WebhookProductPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyField("id"));
        }
        if self.sku.trim().is_empty() {
            return Err(ValidationError::EmptyField("sku"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if self.price < Decimal::ZERO {
            return Err(ValidationError::NegativePrice);
        }
        if let Some(variants) = &self.variants {
            for v in variants {
                v.validate()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Shipping,
    Pickup,
}

impl DeliveryMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMethod::Shipping => "shipping",
            DeliveryMethod::Pickup => "pickup",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "shipping" => Ok(DeliveryMethod::Shipping),
            "pickup" => Ok(DeliveryMethod::Pickup),
            other => Err(ValidationError::UnknownDeliveryMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl BuyerInfo {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Delivery selection; address fields apply to `shipping`, pickup fields
/// to `pickup`. Serialized verbatim onto the order for later fulfilment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingSelection {
    pub method: DeliveryMethod,
    pub address: Option<String>,
    pub floor_apt: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub zip_code: Option<String>,
    pub pickup_name: Option<String>,
    pub pickup_dni: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingInfo {
    pub invoice_type: String,
    pub name: Option<String>,
    pub dni: Option<String>,
    pub cuit: Option<String>,
    pub fiscal_address: Option<String>,
    pub email: Option<String>,
}

/// One cart line. `unit_price` is the client-observed price and is
/// snapshotted onto the order item; the placement engine audits it against
/// the catalog but does not reprice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub variant_id: Option<i64>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub buyer: BuyerInfo,
    pub shipping: ShippingSelection,
    pub billing: BillingInfo,
    pub items: Vec<CartLine>,
}

impl OrderRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.buyer.email.trim().is_empty() {
            return Err(ValidationError::EmptyField("buyer.email"));
        }
        if self.buyer.first_name.trim().is_empty() {
            return Err(ValidationError::EmptyField("buyer.first_name"));
        }
        if self.items.is_empty() {
            return Err(ValidationError::EmptyOrder);
        }
        for line in &self.items {
            if line.product_id.trim().is_empty() {
                return Err(ValidationError::EmptyField("items[].product_id"));
            }
            if line.quantity <= 0 {
                return Err(ValidationError::NonPositiveQuantity(line.quantity));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(ValidationError::NegativePrice);
            }
        }
        Ok(())
    }

    /// Σ quantity × unit price over all cart lines.
    #[must_use]
    pub fn products_total(&self) -> Decimal {
        self.items
            .iter()
            .map(|line| Decimal::from(line.quantity) * line.unit_price)
            .sum()
    }
}
