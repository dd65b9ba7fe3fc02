use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line of a checkout preference. Shipping is sent as an extra line
/// when it costs anything, so the buyer sees the full charge itemized.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceLine {
    pub id: String,
    pub title: String,
    pub quantity: i32,
    pub currency_id: &'static str,
    pub unit_price: Decimal,
}

impl PreferenceLine {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            quantity,
            currency_id: "ARS",
            unit_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PreferenceRequest<'a> {
    pub items: &'a [PreferenceLine],
    pub external_reference: String,
    pub back_urls: BackUrls,
    pub statement_descriptor: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreferenceResponse {
    pub init_point: String,
}

/// Verdict for a payment reference, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Approved,
    /// Any non-approved gateway status, carried verbatim for the caller.
    Other(String),
}

impl PaymentStatus {
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        if raw == "approved" {
            PaymentStatus::Approved
        } else {
            PaymentStatus::Other(raw.to_string())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Approved => "approved",
            PaymentStatus::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentStatusResponse {
    pub status: String,
}
