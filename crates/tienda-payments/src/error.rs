use thiserror::Error;

/// Errors returned by the payment gateway client.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success HTTP status.
    #[error("gateway rejected the request: HTTP {status}: {body}")]
    Gateway { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The client was built without an access token; calls cannot succeed.
    #[error("payment gateway access token is not configured")]
    MissingAccessToken,
}
