use std::net::SocketAddr;

use crate::shipping::ShippingRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide configuration, resolved once at startup.
///
/// Collaborator credentials (payment gateway, management platform) are
/// carried here and handed to each client at construction time; nothing
/// reads the environment after startup.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_request_timeout_secs: u64,
    pub payment_base_url: String,
    pub payment_access_token: Option<String>,
    pub checkout_return_url: String,
    pub platform_webhook_url: Option<String>,
    pub platform_api_token: Option<String>,
    pub admin_email: String,
    pub shipping: ShippingRules,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_request_timeout_secs", &self.http_request_timeout_secs)
            .field("payment_base_url", &self.payment_base_url)
            .field(
                "payment_access_token",
                &self.payment_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("checkout_return_url", &self.checkout_return_url)
            .field("platform_webhook_url", &self.platform_webhook_url)
            .field(
                "platform_api_token",
                &self.platform_api_token.as_ref().map(|_| "[redacted]"),
            )
            .field("admin_email", &self.admin_email)
            .field("shipping", &self.shipping)
            .finish()
    }
}
