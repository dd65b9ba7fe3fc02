//! Catalog reconciliation: product/variant upserts from the management
//! platform, aggregate stock recomputation, and storefront reads.
//!
//! Two write paths share the variant ledger: bulk sync (per-record isolation,
//! keyed by SKU) and the single-product webhook (all-or-nothing, keyed by
//! product id). Both end by recomputing the product's aggregate stock from
//! the authoritative variant rows rather than patching it incrementally.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use tienda_core::{SyncProductRecord, WebhookProductPayload};

use crate::{DbError, StoreError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: String,
    pub external_id: Option<String>,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    /// Derived aggregate when the product has variants; standalone stock
    /// otherwise.
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub price_override: Option<Decimal>,
    pub discount_percentage: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `product_variants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariantRow {
    pub id: i64,
    pub product_id: String,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `product_images` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImageRow {
    pub id: i64,
    pub product_id: String,
    pub url: String,
    pub display_order: i32,
}

/// Counters returned by a bulk sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: u32,
    pub updated: u32,
    pub errors: u32,
}

/// Result of applying a single-product webhook.
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub product_id: String,
    pub variants_processed: usize,
}

// ---------------------------------------------------------------------------
// Variant ledger
// ---------------------------------------------------------------------------

/// Upserts a variant by globally-unique SKU, re-parenting it when the SKU
/// already exists under a different product.
///
/// Re-parenting ("SKU steal") is deliberate: SKU is the cross-system
/// correlation key, so the same SKU reappearing under a new owner moves the
/// variant. The move is logged at `warn` and the previous owner's id is
/// returned so the caller can recompute that product's aggregate stock in
/// the same transaction.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if any statement fails.
pub async fn upsert_variant(
    conn: &mut PgConnection,
    sku: &str,
    owner_product_id: &str,
    stock: i32,
    size: Option<&str>,
    color: Option<&str>,
) -> Result<(i64, Option<String>), sqlx::Error> {
    // Lock the existing row (if any) for the rest of the transaction so a
    // concurrent order placement cannot decrement a variant mid-replace.
    let existing = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, product_id FROM product_variants WHERE sku = $1 FOR UPDATE",
    )
    .bind(sku)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((id, current_owner)) = existing {
        let previous_owner = if current_owner == owner_product_id {
            None
        } else {
            tracing::warn!(
                sku,
                from_product = %current_owner,
                to_product = %owner_product_id,
                "variant re-parented by SKU correlation"
            );
            Some(current_owner)
        };

        sqlx::query(
            "UPDATE product_variants SET \
                 product_id = $2, \
                 stock      = $3, \
                 size       = COALESCE($4, size), \
                 color      = COALESCE($5, color), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(owner_product_id)
        .bind(stock)
        .bind(size)
        .bind(color)
        .execute(&mut *conn)
        .await?;

        return Ok((id, previous_owner));
    }

    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO product_variants (product_id, sku, size, color, stock) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(owner_product_id)
    .bind(sku)
    .bind(size)
    .bind(color)
    .bind(stock)
    .fetch_one(&mut *conn)
    .await?;

    Ok((id, None))
}

/// Sets `products.stock` to the sum of the product's current variant stocks.
///
/// Must be called in the same transaction as any variant batch mutation;
/// the aggregate is a recomputed projection, never patched incrementally.
/// Products without variants keep their standalone stock (this function is
/// only invoked on paths that manage variants).
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the update fails.
pub async fn recompute_aggregate_stock(
    conn: &mut PgConnection,
    product_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products SET \
             stock = (SELECT COALESCE(SUM(stock), 0)::int \
                      FROM product_variants WHERE product_id = $1), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Bulk sync
// ---------------------------------------------------------------------------

/// Applies a batch of simple product records keyed by SKU.
///
/// Each record runs in its own transaction: a bad record is logged, counted
/// in `errors`, and the batch continues. Category associations are additive;
/// sync never removes them. Products that carry variants get their aggregate
/// recomputed instead of trusting the synced stock figure, so the
/// aggregate-equals-variant-sum invariant survives a sync racing a webhook.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] only for infrastructure failures (acquiring a
/// connection); per-record failures are absorbed into the summary.
pub async fn sync_products(
    pool: &PgPool,
    records: &[SyncProductRecord],
) -> Result<SyncSummary, DbError> {
    let mut summary = SyncSummary::default();

    for record in records {
        match sync_one_product(pool, record).await {
            Ok(true) => summary.created += 1,
            Ok(false) => summary.updated += 1,
            Err(e) => {
                tracing::warn!(sku = %record.sku, error = %e, "sync record failed; continuing");
                summary.errors += 1;
            }
        }
    }

    Ok(summary)
}

/// Upserts one sync record. Returns `true` when a new product was created.
async fn sync_one_product(pool: &PgPool, record: &SyncProductRecord) -> Result<bool, StoreError> {
    record.validate()?;

    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "INSERT INTO products \
             (id, external_id, sku, name, description, price, stock, image_url, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (sku) DO UPDATE SET \
             external_id = COALESCE(EXCLUDED.external_id, products.external_id), \
             name        = EXCLUDED.name, \
             description = EXCLUDED.description, \
             price       = EXCLUDED.price, \
             stock       = EXCLUDED.stock, \
             image_url   = EXCLUDED.image_url, \
             is_active   = EXCLUDED.is_active, \
             updated_at  = NOW() \
         RETURNING id, (xmax = 0) AS inserted",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&record.external_id)
    .bind(&record.sku)
    .bind(&record.name)
    .bind(&record.description)
    .bind(record.price)
    .bind(record.stock)
    .bind(&record.image_url)
    .bind(record.is_active)
    .fetch_one(&mut *tx)
    .await?;

    let product_id: String = row.get("id");
    let inserted: bool = row.get("inserted");

    if let Some(category) = &record.category {
        attach_category(&mut tx, &product_id, category).await?;
    }

    if !record.images.is_empty() {
        replace_images(&mut tx, &product_id, &record.images).await?;
    }

    // The synced stock figure only applies to simple products; for products
    // with variants the variant ledger stays authoritative.
    let has_variants: bool = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM product_variants WHERE product_id = $1)",
    )
    .bind(&product_id)
    .fetch_one(&mut *tx)
    .await?;
    if has_variants {
        recompute_aggregate_stock(&mut tx, &product_id).await?;
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Trims and additively attaches a category to a product.
async fn attach_category(
    conn: &mut PgConnection,
    product_id: &str,
    raw_name: &str,
) -> Result<(), sqlx::Error> {
    let name = raw_name.trim();
    if name.is_empty() {
        return Ok(());
    }

    let category_id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO categories (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id",
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO product_categories (product_id, category_id) \
         VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(product_id)
    .bind(category_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Replaces a product's image set, preserving payload order (index 0 = primary).
async fn replace_images(
    conn: &mut PgConnection,
    product_id: &str,
    urls: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM product_images WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    for (index, url) in urls.iter().enumerate() {
        sqlx::query(
            "INSERT INTO product_images (product_id, url, display_order) VALUES ($1, $2, $3)",
        )
        .bind(product_id)
        .bind(url)
        .bind(i32::try_from(index).unwrap_or(i32::MAX))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Single-product webhook
// ---------------------------------------------------------------------------

/// Applies one authoritative product push from the management platform.
///
/// All-or-nothing: product fields, image replacement, variant replace-set,
/// and aggregate recomputation commit together or not at all — a partial
/// application would desynchronize the aggregate stock.
///
/// `payload.variants == None` means the product is a simple stock item and
/// existing variants are left untouched; `Some(list)` (including an empty
/// list) is the complete desired variant set.
///
/// # Errors
///
/// - [`StoreError::Invalid`] for a structurally bad payload (no mutation).
/// - [`StoreError::Db`] if any statement fails (full rollback).
pub async fn apply_product_webhook(
    pool: &PgPool,
    payload: &WebhookProductPayload,
) -> Result<WebhookOutcome, StoreError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE products SET \
             sku         = $2, \
             name        = $3, \
             price       = $4, \
             description = COALESCE($5, description), \
             image_url   = COALESCE($6, image_url), \
             updated_at  = NOW() \
         WHERE id = $1",
    )
    .bind(&payload.id)
    .bind(&payload.sku)
    .bind(&payload.name)
    .bind(payload.price)
    .bind(&payload.description)
    .bind(&payload.image_url)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        sqlx::query(
            "INSERT INTO products (id, sku, name, description, price, stock, image_url, is_active) \
             VALUES ($1, $2, $3, $4, $5, 0, $6, TRUE)",
        )
        .bind(&payload.id)
        .bind(&payload.sku)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(payload.price)
        .bind(&payload.image_url)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(category) = &payload.category {
        attach_category(&mut tx, &payload.id, category).await?;
    }

    if let Some(images) = &payload.images {
        replace_images(&mut tx, &payload.id, images).await?;
    }

    let mut variants_processed = 0;
    if let Some(variants) = &payload.variants {
        let incoming_skus: Vec<String> = variants.iter().map(|v| v.sku.clone()).collect();

        // Every writer takes product locks before variant locks. Lock the
        // rows whose aggregate this replace-set can touch, including the
        // current owner of any stolen SKU, before the first variant lock.
        sqlx::query(
            "SELECT id FROM products \
             WHERE id = $1 OR id IN ( \
                 SELECT product_id FROM product_variants WHERE sku = ANY($2)) \
             ORDER BY id \
             FOR UPDATE",
        )
        .bind(&payload.id)
        .bind(&incoming_skus)
        .execute(&mut *tx)
        .await?;

        // Replace-set: owned variants absent from the payload are deleted
        // before the upserts.
        sqlx::query("DELETE FROM product_variants WHERE product_id = $1 AND NOT (sku = ANY($2))")
            .bind(&payload.id)
            .bind(&incoming_skus)
            .execute(&mut *tx)
            .await?;

        // Former owners of stolen SKUs need their aggregates recomputed too.
        let mut stolen_from: Vec<String> = Vec::new();
        for variant in variants {
            let (_, previous_owner) = upsert_variant(
                &mut tx,
                &variant.sku,
                &payload.id,
                variant.stock,
                variant.size.as_deref(),
                variant.color.as_deref(),
            )
            .await?;
            if let Some(owner) = previous_owner {
                if !stolen_from.contains(&owner) {
                    stolen_from.push(owner);
                }
            }
            variants_processed += 1;
        }

        recompute_aggregate_stock(&mut tx, &payload.id).await?;
        for owner in &stolen_from {
            recompute_aggregate_stock(&mut tx, owner).await?;
        }
    }

    tx.commit().await?;

    tracing::info!(
        product_id = %payload.id,
        sku = %payload.sku,
        variants_processed,
        "product webhook applied"
    );

    Ok(WebhookOutcome {
        product_id: payload.id.clone(),
        variants_processed,
    })
}

// ---------------------------------------------------------------------------
// Storefront reads
// ---------------------------------------------------------------------------

/// Filters for the storefront product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub search: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

/// One page of active products plus the unpaged total.
#[derive(Debug, Clone)]
pub struct CatalogPage {
    pub items: Vec<ProductRow>,
    pub total: i64,
}

/// Lists active products with optional category filter and case-insensitive
/// name search.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn list_products(pool: &PgPool, filters: &ProductFilters) -> Result<CatalogPage, DbError> {
    let limit = filters.limit.clamp(1, 100);
    let pattern = filters.search.as_ref().map(|s| format!("%{s}%"));

    let where_clause = "FROM products p \
         WHERE p.is_active = TRUE \
           AND ($1::text IS NULL OR EXISTS ( \
                 SELECT 1 FROM product_categories pc \
                 JOIN categories c ON c.id = pc.category_id \
                 WHERE pc.product_id = p.id AND c.name = $1)) \
           AND ($2::text IS NULL OR p.name ILIKE $2)";

    let total: i64 = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {where_clause}"))
        .bind(&filters.category)
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

    let items = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT p.* {where_clause} ORDER BY p.name, p.id OFFSET $3 LIMIT $4"
    ))
    .bind(&filters.category)
    .bind(&pattern)
    .bind(filters.offset.max(0))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(CatalogPage { items, total })
}

/// Fetches one product with its variants and ordered images.
///
/// # Errors
///
/// Returns [`StoreError::ProductNotFound`] if the id is unknown.
pub async fn get_product(
    pool: &PgPool,
    product_id: &str,
) -> Result<(ProductRow, Vec<VariantRow>, Vec<ImageRow>), StoreError> {
    let product = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StoreError::ProductNotFound(product_id.to_string()))?;

    let variants = sqlx::query_as::<_, VariantRow>(
        "SELECT * FROM product_variants WHERE product_id = $1 ORDER BY id",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    let images = sqlx::query_as::<_, ImageRow>(
        "SELECT * FROM product_images WHERE product_id = $1 ORDER BY display_order, id",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok((product, variants, images))
}

// ---------------------------------------------------------------------------
// Admin maintenance
// ---------------------------------------------------------------------------

/// Deletes a product and everything it owns (variants first, then images
/// and category/label joins) in one transaction.
///
/// # Errors
///
/// Returns [`StoreError::ProductNotFound`] if the id is unknown; nothing is
/// deleted in that case.
pub async fn delete_product(pool: &PgPool, product_id: &str) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM product_images WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM product_labels WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        tx.rollback().await?;
        return Err(StoreError::ProductNotFound(product_id.to_string()));
    }

    tx.commit().await?;
    tracing::info!(product_id, "product deleted with owned rows");
    Ok(())
}

/// Sets the admin pricing layer on a product. The stored base `price` is
/// never touched; `None` clears the override.
///
/// # Errors
///
/// Returns [`StoreError::ProductNotFound`] if the id is unknown.
pub async fn set_price_override(
    pool: &PgPool,
    product_id: &str,
    price_override: Option<Decimal>,
    discount_percentage: i32,
) -> Result<(), StoreError> {
    let updated = sqlx::query(
        "UPDATE products SET \
             price_override      = $2, \
             discount_percentage = $3, \
             updated_at          = NOW() \
         WHERE id = $1",
    )
    .bind(product_id)
    .bind(price_override)
    .bind(discount_percentage.clamp(0, 100))
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(StoreError::ProductNotFound(product_id.to_string()));
    }
    Ok(())
}

/// Re-derives the aggregate stock for every product that has variants.
///
/// Maintenance hatch for repairing drift (e.g. rows edited out-of-band).
/// Returns the number of products whose stock changed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn recompute_all_aggregates(pool: &PgPool) -> Result<u64, DbError> {
    let affected = sqlx::query(
        "UPDATE products p SET stock = v.total, updated_at = NOW() \
         FROM (SELECT product_id, COALESCE(SUM(stock), 0)::int AS total \
               FROM product_variants GROUP BY product_id) v \
         WHERE p.id = v.product_id AND p.stock <> v.total",
    )
    .execute(pool)
    .await?
    .rows_affected();

    Ok(affected)
}
