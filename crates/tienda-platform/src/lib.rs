//! Client for the external management platform's "new sale" webhook.
//!
//! Fired after an order transitions to `paid`; delivery is best-effort and
//! the caller treats any failure as log-and-continue. Configuration is
//! injected at construction — an unconfigured client reports itself as
//! disabled instead of erroring.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by the platform webhook client.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with a non-success HTTP status.
    #[error("platform webhook rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub doc_type: String,
    pub doc_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleItem {
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleShipping {
    /// "shipping" or "pickup".
    pub r#type: String,
    pub cost: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_details: Option<serde_json::Value>,
}

/// The full "new sale" notification body pushed to the platform.
#[derive(Debug, Clone, Serialize)]
pub struct NewSalePayload {
    pub external_order_id: String,
    pub payment_id: String,
    pub date: DateTime<Utc>,
    pub customer: SaleCustomer,
    pub shipping: SaleShipping,
    pub billing: serde_json::Value,
    pub items: Vec<SaleItem>,
    pub total: Decimal,
    pub payment_method: String,
}

/// Client for the management platform webhook endpoint.
pub struct PlatformClient {
    client: Client,
    webhook_url: Option<String>,
    api_token: Option<String>,
}

impl PlatformClient {
    /// Creates a new client. `webhook_url == None` builds a disabled client
    /// whose notifications are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        webhook_url: Option<String>,
        api_token: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tienda/0.1 (storefront)")
            .build()?;

        Ok(Self {
            client,
            webhook_url,
            api_token,
        })
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Pushes a new-sale notification. A disabled client returns `Ok(())`
    /// after logging a warning, matching the best-effort contract.
    ///
    /// # Errors
    ///
    /// - [`PlatformError::Rejected`] on a non-success HTTP status.
    /// - [`PlatformError::Http`] on transport failure.
    pub async fn notify_new_sale(&self, payload: &NewSalePayload) -> Result<(), PlatformError> {
        let Some(url) = self.webhook_url.as_deref() else {
            tracing::warn!("platform webhook URL not configured; skipping new-sale notification");
            return Ok(());
        };

        let mut request = self.client.post(url).json(payload);
        if let Some(token) = self.api_token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(order = %payload.external_order_id, "new-sale notification delivered");
        Ok(())
    }
}
