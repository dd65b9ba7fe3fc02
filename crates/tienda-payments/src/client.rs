use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::PaymentError;
use crate::types::{
    BackUrls, PaymentStatus, PaymentStatusResponse, PreferenceLine, PreferenceRequest,
    PreferenceResponse,
};

/// Client for the payment gateway's REST API.
///
/// Use [`PaymentClient::new`] for production or point `base_url` at a mock
/// server in tests. A client built without an access token fails every call
/// with [`PaymentError::MissingAccessToken`], which callers treat as a
/// best-effort degradation rather than an order failure.
pub struct PaymentClient {
    client: Client,
    access_token: Option<String>,
    base_url: Url,
    return_url: String,
    statement_descriptor: String,
}

impl PaymentClient {
    /// Creates a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`PaymentError::Gateway`] if `base_url` is
    /// not a valid URL.
    pub fn new(
        base_url: &str,
        access_token: Option<String>,
        return_url: &str,
        timeout_secs: u64,
    ) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tienda/0.1 (storefront)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| PaymentError::Gateway {
            status: 0,
            body: format!("invalid base URL '{normalised}': {e}"),
        })?;

        Ok(Self {
            client,
            access_token,
            base_url,
            return_url: return_url.trim_end_matches('/').to_string(),
            statement_descriptor: "TIENDA".to_string(),
        })
    }

    fn token(&self) -> Result<&str, PaymentError> {
        self.access_token
            .as_deref()
            .ok_or(PaymentError::MissingAccessToken)
    }

    /// Creates a checkout preference for an order and returns the URL the
    /// buyer should be redirected to.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::MissingAccessToken`] if no token was configured.
    /// - [`PaymentError::Gateway`] on a non-success HTTP status.
    /// - [`PaymentError::Http`] / [`PaymentError::Deserialize`] on transport
    ///   or shape failures.
    pub async fn create_preference(
        &self,
        order_id: i64,
        lines: &[PreferenceLine],
    ) -> Result<String, PaymentError> {
        let token = self.token()?;
        let url = self.endpoint("checkout/preferences")?;

        let request = PreferenceRequest {
            items: lines,
            external_reference: order_id.to_string(),
            back_urls: BackUrls {
                success: format!("{}/success", self.return_url),
                failure: format!("{}/failure", self.return_url),
                pending: format!("{}/pending", self.return_url),
            },
            statement_descriptor: &self.statement_descriptor,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(
                order_id,
                status = status.as_u16(),
                "gateway rejected preference request"
            );
            return Err(PaymentError::Gateway {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(order_id, "checkout preference created");

        let parsed: PreferenceResponse =
            serde_json::from_str(&body).map_err(|e| PaymentError::Deserialize {
                context: format!("create_preference(order_id={order_id})"),
                source: e,
            })?;

        Ok(parsed.init_point)
    }

    /// Looks up the status of a payment reference.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::MissingAccessToken`] if no token was configured.
    /// - [`PaymentError::Gateway`] on a non-success HTTP status.
    /// - [`PaymentError::Http`] / [`PaymentError::Deserialize`] on transport
    ///   or shape failures.
    pub async fn get_payment_status(
        &self,
        payment_reference: &str,
    ) -> Result<PaymentStatus, PaymentError> {
        let token = self.token()?;
        let url = self.endpoint(&format!("v1/payments/{payment_reference}"))?;

        let response = self.client.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(
                payment_reference,
                status = status.as_u16(),
                "gateway rejected status lookup"
            );
            return Err(PaymentError::Gateway {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PaymentStatusResponse =
            serde_json::from_str(&body).map_err(|e| PaymentError::Deserialize {
                context: format!("get_payment_status({payment_reference})"),
                source: e,
            })?;

        Ok(PaymentStatus::from_raw(&parsed.status))
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.base_url.join(path).map_err(|e| PaymentError::Gateway {
            status: 0,
            body: format!("invalid endpoint path '{path}': {e}"),
        })
    }
}
