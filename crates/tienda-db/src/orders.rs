//! Order placement with atomic stock reservation, the confirmation gate's
//! persistence, and token-gated order lookup.
//!
//! Placement is one transaction end to end: customer upsert, order row,
//! and the per-line check-and-decrement loop. Every stock read that
//! precedes a decrement takes a row lock (`FOR UPDATE`) and every
//! decrement is additionally guarded by `stock >= quantity`, so two
//! concurrent orders against the same low-stock variant serialize and the
//! loser is rejected instead of driving stock negative.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgConnection, PgPool};

use tienda_core::{descriptor_from, effective_price, OrderLineView, OrderRequest, ShippingRules};

use crate::customers::{upsert_customer, CustomerRow};
use crate::StoreError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub customer_id: i64,
    pub total_amount: Decimal,
    pub status: String,
    pub delivery_method: String,
    pub shipping_data: Option<serde_json::Value>,
    pub billing_data: Option<serde_json::Value>,
    /// Durable payment correlation token; first write wins, never
    /// overwritten by a different value.
    pub payment_id: Option<String>,
    pub payment_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `order_items` table. Immutable once created; `unit_price`
/// is the price snapshot taken at placement time.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: String,
    pub variant_id: Option<i64>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A successfully placed order, pre-payment.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: OrderRow,
    pub customer: CustomerRow,
    pub items: Vec<OrderItemRow>,
    pub shipping_cost: Decimal,
}

/// Access token for customer-facing order lookup: either the payment
/// reference attached at confirmation, or the buyer's email.
#[derive(Debug, Clone, Copy)]
pub enum OrderAccess<'a> {
    PaymentReference(&'a str),
    Email(&'a str),
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Places an order: upserts the customer, creates the order and its items,
/// and atomically validates and decrements stock for every cart line.
///
/// Any failure rolls the whole transaction back — no order exists with
/// stock undetected, and no decrement survives a rejected order. The
/// client-supplied unit price is snapshotted as charged; divergence from
/// the catalog's effective price is logged for audit, not repriced.
///
/// # Errors
///
/// - [`StoreError::Invalid`] for a structurally bad request (no mutation).
/// - [`StoreError::ProductNotFound`] / [`StoreError::VariantNotFound`] when
///   a cart line names an unknown item.
/// - [`StoreError::InsufficientStock`] naming the item and the available
///   quantity.
/// - [`StoreError::Db`] for infrastructure failures.
pub async fn place_order(
    pool: &PgPool,
    request: &OrderRequest,
    rules: &ShippingRules,
) -> Result<PlacedOrder, StoreError> {
    request.validate()?;

    let products_total = request.products_total();
    let shipping_cost = rules.cost(products_total, request.shipping.method);
    let total = products_total + shipping_cost;

    let mut tx = pool.begin().await?;

    let customer = upsert_customer(
        &mut tx,
        &request.buyer.full_name(),
        &request.buyer.email,
        request.buyer.phone.as_deref(),
    )
    .await?;

    let order = sqlx::query_as::<_, OrderRow>(
        "INSERT INTO orders \
             (customer_id, total_amount, status, delivery_method, shipping_data, billing_data) \
         VALUES ($1, $2, 'pending', $3, $4, $5) \
         RETURNING *",
    )
    .bind(customer.id)
    .bind(total)
    .bind(request.shipping.method.as_str())
    .bind(Json(&request.shipping))
    .bind(Json(&request.billing))
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(request.items.len());
    for line in &request.items {
        reserve_line_stock(&mut tx, line).await?;

        let item = sqlx::query_as::<_, OrderItemRow>(
            "INSERT INTO order_items (order_id, product_id, variant_id, quantity, unit_price) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING *",
        )
        .bind(order.id)
        .bind(&line.product_id)
        .bind(line.variant_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);
    }

    tx.commit().await?;

    tracing::info!(
        order_id = order.id,
        customer_id = customer.id,
        total = %order.total_amount,
        lines = items.len(),
        "order placed"
    );

    Ok(PlacedOrder {
        order,
        customer,
        items,
        shipping_cost,
    })
}

/// Row shape used while holding the product lock during placement.
#[derive(Debug, sqlx::FromRow)]
struct LockedProduct {
    name: String,
    stock: i32,
    price: Decimal,
    price_override: Option<Decimal>,
    discount_percentage: i32,
}

/// Validates and decrements stock for one cart line under row locks.
async fn reserve_line_stock(
    conn: &mut PgConnection,
    line: &tienda_core::CartLine,
) -> Result<(), StoreError> {
    let product = sqlx::query_as::<_, LockedProduct>(
        "SELECT name, stock, price, price_override, discount_percentage \
         FROM products WHERE id = $1 FOR UPDATE",
    )
    .bind(&line.product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::ProductNotFound(line.product_id.clone()))?;

    let catalog_price = effective_price(
        product.price,
        product.price_override,
        product.discount_percentage,
    );
    if line.unit_price != catalog_price {
        tracing::warn!(
            product_id = %line.product_id,
            charged = %line.unit_price,
            catalog = %catalog_price,
            "price_mismatch: client unit price diverges from catalog"
        );
    }

    if let Some(variant_id) = line.variant_id {
        let variant = sqlx::query_as::<_, (String, Option<String>, Option<String>, String, i32)>(
            "SELECT product_id, size, color, sku, stock \
             FROM product_variants WHERE id = $1 FOR UPDATE",
        )
        .bind(variant_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some((owner, size, color, sku, available)) = variant else {
            return Err(StoreError::VariantNotFound {
                product_id: line.product_id.clone(),
                variant_id,
            });
        };
        if owner != line.product_id {
            return Err(StoreError::VariantNotFound {
                product_id: line.product_id.clone(),
                variant_id,
            });
        }

        let descriptor = descriptor_from(size.as_deref(), color.as_deref(), &sku);
        if available < line.quantity {
            return Err(StoreError::InsufficientStock {
                item: format!("{} ({descriptor})", product.name),
                requested: line.quantity,
                available,
            });
        }

        let decremented = sqlx::query(
            "UPDATE product_variants SET stock = stock - $2, updated_at = NOW() \
             WHERE id = $1 AND stock >= $2",
        )
        .bind(variant_id)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if decremented == 0 {
            return Err(StoreError::InsufficientStock {
                item: format!("{} ({descriptor})", product.name),
                requested: line.quantity,
                available,
            });
        }

        // Aggregate mirrors the variant decrement, floored at zero so a
        // pre-existing drift between aggregate and variant sum cannot make
        // the update violate constraints.
        sqlx::query(
            "UPDATE products SET stock = GREATEST(stock - $2, 0), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(&line.product_id)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;

        return Ok(());
    }

    // Simple stock item: the product row itself is the ledger.
    if product.stock < line.quantity {
        return Err(StoreError::InsufficientStock {
            item: product.name,
            requested: line.quantity,
            available: product.stock,
        });
    }

    let decremented = sqlx::query(
        "UPDATE products SET stock = stock - $2, updated_at = NOW() \
         WHERE id = $1 AND stock >= $2",
    )
    .bind(&line.product_id)
    .bind(line.quantity)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if decremented == 0 {
        return Err(StoreError::InsufficientStock {
            item: product.name,
            requested: line.quantity,
            available: product.stock,
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Confirmation gate persistence
// ---------------------------------------------------------------------------

/// Loads an order with its customer and items.
///
/// # Errors
///
/// Returns [`StoreError::OrderNotFound`] if the id is unknown.
pub async fn get_order(
    pool: &PgPool,
    order_id: i64,
) -> Result<(OrderRow, CustomerRow, Vec<OrderItemRow>), StoreError> {
    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::OrderNotFound(order_id))?;

    let customer = sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE id = $1")
        .bind(order.customer_id)
        .fetch_one(pool)
        .await?;

    let items =
        sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
            .bind(order_id)
            .fetch_all(pool)
            .await?;

    Ok((order, customer, items))
}

/// Attaches the payment reference to an order, first-write-wins.
///
/// The reference is persisted regardless of the eventual gateway verdict:
/// it doubles as the customer's order-lookup token. Re-sending the same or
/// a different reference after the first write is a no-op.
///
/// # Errors
///
/// Returns [`StoreError::OrderNotFound`] if the id is unknown.
pub async fn set_payment_reference(
    pool: &PgPool,
    order_id: i64,
    payment_reference: &str,
) -> Result<(), StoreError> {
    let updated = sqlx::query(
        "UPDATE orders SET payment_id = $2 WHERE id = $1 AND payment_id IS NULL",
    )
    .bind(order_id)
    .bind(payment_reference)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        ensure_order_exists(pool, order_id).await?;
    }
    Ok(())
}

/// Transitions `pending -> paid` exactly once.
///
/// Returns `true` only for the call that performed the transition; the
/// caller fires notification side effects on `true` and skips them on
/// `false`, which is what makes re-confirmation idempotent.
///
/// # Errors
///
/// Returns [`StoreError::OrderNotFound`] if the id is unknown.
pub async fn mark_paid_once(pool: &PgPool, order_id: i64) -> Result<bool, StoreError> {
    let updated = sqlx::query("UPDATE orders SET status = 'paid' WHERE id = $1 AND status <> 'paid'")
        .bind(order_id)
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        ensure_order_exists(pool, order_id).await?;
        return Ok(false);
    }
    Ok(true)
}

/// Persists the checkout URL handed back by the payment gateway.
///
/// # Errors
///
/// Returns [`StoreError::OrderNotFound`] if the id is unknown.
pub async fn set_payment_url(pool: &PgPool, order_id: i64, url: &str) -> Result<(), StoreError> {
    let updated = sqlx::query("UPDATE orders SET payment_url = $2 WHERE id = $1")
        .bind(order_id)
        .bind(url)
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(StoreError::OrderNotFound(order_id));
    }
    Ok(())
}

async fn ensure_order_exists(pool: &PgPool, order_id: i64) -> Result<(), StoreError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
        .bind(order_id)
        .fetch_one(pool)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(StoreError::OrderNotFound(order_id))
    }
}

// ---------------------------------------------------------------------------
// Customer-facing lookup
// ---------------------------------------------------------------------------

/// Loads an order only when the caller can prove a claim to it: a matching
/// payment reference, or an email matching the order's customer
/// (case-insensitively).
///
/// A wrong token answers exactly like a missing order so callers cannot
/// probe which ids exist.
///
/// # Errors
///
/// Returns [`StoreError::OrderNotFound`] for unknown ids and failed claims.
pub async fn find_order_for_viewer(
    pool: &PgPool,
    order_id: i64,
    access: OrderAccess<'_>,
) -> Result<(OrderRow, CustomerRow, Vec<OrderItemRow>), StoreError> {
    let (order, customer, items) = get_order(pool, order_id).await?;

    let allowed = match access {
        OrderAccess::PaymentReference(reference) => order
            .payment_id
            .as_deref()
            .is_some_and(|stored| stored == reference),
        OrderAccess::Email(email) => customer.email.eq_ignore_ascii_case(email),
    };

    if allowed {
        Ok((order, customer, items))
    } else {
        Err(StoreError::OrderNotFound(order_id))
    }
}

/// Projects an order's items into [`OrderLineView`]s for notification
/// formatting: catalog-backed lines become `Persisted`, lines whose product
/// has since been deleted degrade to `Ephemeral`.
///
/// # Errors
///
/// Returns [`StoreError::Db`] if the query fails.
pub async fn order_line_views(
    pool: &PgPool,
    order_id: i64,
) -> Result<Vec<OrderLineView>, StoreError> {
    let rows = sqlx::query_as::<
        _,
        (
            String,
            i32,
            Decimal,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        ),
    >(
        "SELECT oi.product_id, oi.quantity, oi.unit_price, \
                p.name, p.sku, v.sku, v.size, v.color \
         FROM order_items oi \
         LEFT JOIN products p ON p.id = oi.product_id \
         LEFT JOIN product_variants v ON v.id = oi.variant_id \
         WHERE oi.order_id = $1 \
         ORDER BY oi.id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    let views = rows
        .into_iter()
        .map(
            |(product_id, quantity, unit_price, name, sku, variant_sku, size, color)| {
                match (name, sku) {
                    (Some(product_name), Some(sku)) => {
                        let variant = variant_sku.as_deref().map(|vsku| {
                            descriptor_from(size.as_deref(), color.as_deref(), vsku)
                        });
                        OrderLineView::Persisted {
                            sku,
                            product_name,
                            variant,
                            quantity,
                            unit_price,
                        }
                    }
                    _ => OrderLineView::Ephemeral {
                        name: format!("Producto {product_id}"),
                        quantity,
                        unit_price,
                    },
                }
            },
        )
        .collect();

    Ok(views)
}
