//! Postgres persistence for the tienda storefront: catalog reconciliation,
//! order placement with stock reservation, and the order confirmation gate.
//!
//! All multi-row mutations run inside a single transaction; stock is only
//! ever touched through row-locked or conditional updates so that two
//! concurrent writers cannot decrement past zero.

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};
use thiserror::Error;

mod catalog;
mod customers;
mod orders;

pub use catalog::{
    apply_product_webhook, delete_product, get_product, list_products, recompute_aggregate_stock,
    recompute_all_aggregates, set_price_override, sync_products, upsert_variant, CatalogPage,
    ImageRow, ProductFilters, ProductRow, SyncSummary, VariantRow, WebhookOutcome,
};
pub use customers::{upsert_customer, upsert_customer_pool, CustomerRow};
pub use orders::{
    find_order_for_viewer, get_order, mark_paid_once, order_line_views, place_order,
    set_payment_reference, set_payment_url, OrderAccess, OrderItemRow, OrderRow, PlacedOrder,
};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/tienda-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &tienda_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

/// Infrastructure-level database failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Domain failures of the reconciliation and ordering core.
///
/// `InsufficientStock` carries a pre-formatted item label (product name plus
/// variant descriptor when applicable) and the available quantity so callers
/// can surface an actionable message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("product not found: {0}")]
    ProductNotFound(String),
    #[error("variant {variant_id} not found for product {product_id}")]
    VariantNotFound { product_id: String, variant_id: i64 },
    #[error("insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: i32,
        available: i32,
    },
    #[error("order not found: {0}")]
    OrderNotFound(i64),
    #[error("invalid payload: {0}")]
    Invalid(#[from] tienda_core::ValidationError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect to a Postgres pool, reading `DATABASE_URL` from env.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] if `DATABASE_URL` is unset, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_env() -> Result<PgPool, DbError> {
    let database_url = env::var("DATABASE_URL").map_err(|_| DbError::MissingDatabaseUrl)?;
    connect_pool(&database_url, PoolConfig::default())
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}
