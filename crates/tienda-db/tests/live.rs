//! Live integration tests for tienda-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/tienda-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory. The suite is ignored by default; run it with
//! `cargo test -- --ignored` against a provisioned `DATABASE_URL`.

use tienda_core::{
    BillingInfo, BuyerInfo, CartLine, DeliveryMethod, OrderLineView, OrderRequest,
    ShippingRules, ShippingSelection, SyncProductRecord, VariantPayload, WebhookProductPayload,
};
use tienda_db::{
    apply_product_webhook, delete_product, find_order_for_viewer, get_order, get_product,
    list_products, mark_paid_once, order_line_views, place_order, recompute_all_aggregates,
    set_payment_reference, set_price_override, sync_products, upsert_customer_pool, OrderAccess,
    ProductFilters, StoreError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Insert a simple product row directly and return its id.
async fn insert_test_product(pool: &sqlx::PgPool, id: &str, sku: &str, stock: i32) -> String {
    sqlx::query(
        "INSERT INTO products (id, sku, name, price, stock, is_active) \
         VALUES ($1, $2, $3, '1500.00', $4, TRUE)",
    )
    .bind(id)
    .bind(sku)
    .bind(format!("Producto {sku}"))
    .bind(stock)
    .execute(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_test_product failed for '{id}': {e}"));
    id.to_string()
}

fn variant(sku: &str, size: &str, stock: i32) -> VariantPayload {
    VariantPayload {
        sku: sku.to_string(),
        size: Some(size.to_string()),
        color: None,
        stock,
    }
}

fn webhook(id: &str, sku: &str, variants: Option<Vec<VariantPayload>>) -> WebhookProductPayload {
    WebhookProductPayload {
        id: id.to_string(),
        sku: sku.to_string(),
        name: format!("Producto {sku}"),
        description: None,
        price: "1500.00".parse().unwrap(),
        image_url: None,
        images: None,
        category: None,
        variants,
    }
}

fn sync_record(sku: &str, stock: i32) -> SyncProductRecord {
    SyncProductRecord {
        sku: sku.to_string(),
        external_id: None,
        name: format!("Producto {sku}"),
        description: None,
        price: "1500.00".parse().unwrap(),
        stock,
        image_url: None,
        images: vec![],
        category: None,
        is_active: true,
    }
}

fn order_request(email: &str, items: Vec<CartLine>) -> OrderRequest {
    OrderRequest {
        buyer: BuyerInfo {
            first_name: "Ana".to_string(),
            last_name: "García".to_string(),
            email: email.to_string(),
            phone: None,
        },
        shipping: ShippingSelection {
            method: DeliveryMethod::Pickup,
            address: None,
            floor_apt: None,
            city: None,
            province: None,
            zip_code: None,
            pickup_name: Some("Ana García".to_string()),
            pickup_dni: Some("12345678".to_string()),
        },
        billing: BillingInfo {
            invoice_type: "B".to_string(),
            name: None,
            dni: Some("12345678".to_string()),
            cuit: None,
            fiscal_address: None,
            email: None,
        },
        items,
    }
}

fn cart_line(product_id: &str, variant_id: Option<i64>, quantity: i32) -> CartLine {
    CartLine {
        product_id: product_id.to_string(),
        variant_id,
        quantity,
        unit_price: "1500.00".parse().unwrap(),
    }
}

fn rules() -> ShippingRules {
    ShippingRules {
        flat_rate: "10000".parse().unwrap(),
        free_threshold: "55000".parse().unwrap(),
    }
}

async fn product_stock(pool: &sqlx::PgPool, product_id: &str) -> i32 {
    sqlx::query_scalar::<_, i32>("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("product stock lookup failed")
}

async fn variant_stock(pool: &sqlx::PgPool, sku: &str) -> i32 {
    sqlx::query_scalar::<_, i32>("SELECT stock FROM product_variants WHERE sku = $1")
        .bind(sku)
        .fetch_one(pool)
        .await
        .expect("variant stock lookup failed")
}

// ---------------------------------------------------------------------------
// Section 1: Bulk sync
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn sync_counts_created_then_updated(pool: sqlx::PgPool) {
    let first = sync_products(&pool, &[sync_record("MATE-001", 10)])
        .await
        .expect("first sync failed");
    assert_eq!(first.created, 1);
    assert_eq!(first.updated, 0);
    assert_eq!(first.errors, 0);

    let second = sync_products(&pool, &[sync_record("MATE-001", 7)])
        .await
        .expect("second sync failed");
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 1);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE sku = 'MATE-001'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "resync must not duplicate the product");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn sync_absorbs_bad_records_and_continues(pool: sqlx::PgPool) {
    let summary = sync_products(&pool, &[sync_record("", 10), sync_record("MATE-002", 5)])
        .await
        .expect("sync failed");
    assert_eq!(summary.created, 1);
    assert_eq!(summary.errors, 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn sync_preserves_variant_aggregate_over_synced_stock(pool: sqlx::PgPool) {
    // Webhook first: product with variants summing to 5.
    apply_product_webhook(
        &pool,
        &webhook(
            "prod-agg",
            "MATE-003",
            Some(vec![variant("VAR-A", "S", 2), variant("VAR-B", "M", 3)]),
        ),
    )
    .await
    .expect("webhook failed");

    // Sync then claims stock 99; the variant ledger must win.
    sync_products(&pool, &[sync_record("MATE-003", 99)])
        .await
        .expect("sync failed");

    assert_eq!(product_stock(&pool, "prod-agg").await, 5);
}

// ---------------------------------------------------------------------------
// Section 2: Product webhook
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn webhook_creates_product_with_variant_aggregate(pool: sqlx::PgPool) {
    let outcome = apply_product_webhook(
        &pool,
        &webhook(
            "prod-1",
            "MATE-010",
            Some(vec![variant("VAR-S", "S", 1), variant("VAR-M", "M", 4)]),
        ),
    )
    .await
    .expect("webhook failed");

    assert_eq!(outcome.product_id, "prod-1");
    assert_eq!(outcome.variants_processed, 2);
    assert_eq!(product_stock(&pool, "prod-1").await, 5);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn webhook_replace_set_deletes_absent_variants(pool: sqlx::PgPool) {
    apply_product_webhook(
        &pool,
        &webhook(
            "prod-2",
            "MATE-011",
            Some(vec![variant("VAR-X", "S", 2), variant("VAR-Y", "M", 3)]),
        ),
    )
    .await
    .expect("first webhook failed");

    // Second push drops VAR-X entirely.
    apply_product_webhook(
        &pool,
        &webhook("prod-2", "MATE-011", Some(vec![variant("VAR-Y", "M", 3)])),
    )
    .await
    .expect("second webhook failed");

    let gone: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM product_variants WHERE sku = 'VAR-X'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(gone, 0, "absent variant should be hard-deleted");
    assert_eq!(product_stock(&pool, "prod-2").await, 3);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn webhook_omitted_variants_leave_ledger_untouched(pool: sqlx::PgPool) {
    apply_product_webhook(
        &pool,
        &webhook("prod-3", "MATE-012", Some(vec![variant("VAR-Z", "S", 6)])),
    )
    .await
    .expect("first webhook failed");

    // Field omitted: simple-product update, variants stay.
    apply_product_webhook(&pool, &webhook("prod-3", "MATE-012", None))
        .await
        .expect("second webhook failed");

    assert_eq!(variant_stock(&pool, "VAR-Z").await, 6);
    assert_eq!(product_stock(&pool, "prod-3").await, 6);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn webhook_sku_steal_recomputes_former_owner(pool: sqlx::PgPool) {
    apply_product_webhook(
        &pool,
        &webhook(
            "prod-old",
            "MATE-020",
            Some(vec![variant("VAR-STEAL", "S", 4), variant("VAR-KEEP", "M", 1)]),
        ),
    )
    .await
    .expect("owner webhook failed");
    assert_eq!(product_stock(&pool, "prod-old").await, 5);

    // Same SKU reappears under a new product: the variant moves.
    apply_product_webhook(
        &pool,
        &webhook("prod-new", "MATE-021", Some(vec![variant("VAR-STEAL", "S", 2)])),
    )
    .await
    .expect("stealing webhook failed");

    let owner: String =
        sqlx::query_scalar("SELECT product_id FROM product_variants WHERE sku = 'VAR-STEAL'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(owner, "prod-new");
    assert_eq!(product_stock(&pool, "prod-new").await, 2);
    assert_eq!(
        product_stock(&pool, "prod-old").await,
        1,
        "former owner's aggregate must be recomputed"
    );
}

// ---------------------------------------------------------------------------
// Section 3: Order placement and stock reservation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn placement_decrements_simple_product_stock(pool: sqlx::PgPool) {
    insert_test_product(&pool, "prod-s", "MATE-030", 10).await;

    let placed = place_order(
        &pool,
        &order_request("ana@example.com", vec![cart_line("prod-s", None, 3)]),
        &rules(),
    )
    .await
    .expect("place_order failed");

    assert_eq!(placed.order.status, "pending");
    assert_eq!(placed.items.len(), 1);
    assert_eq!(product_stock(&pool, "prod-s").await, 7);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn placement_decrements_variant_and_mirrors_aggregate(pool: sqlx::PgPool) {
    apply_product_webhook(
        &pool,
        &webhook(
            "prod-v",
            "MATE-031",
            Some(vec![variant("VAR-P", "S", 4), variant("VAR-Q", "M", 6)]),
        ),
    )
    .await
    .expect("webhook failed");

    let variant_id: i64 =
        sqlx::query_scalar("SELECT id FROM product_variants WHERE sku = 'VAR-P'")
            .fetch_one(&pool)
            .await
            .unwrap();

    place_order(
        &pool,
        &order_request("ana@example.com", vec![cart_line("prod-v", Some(variant_id), 3)]),
        &rules(),
    )
    .await
    .expect("place_order failed");

    assert_eq!(variant_stock(&pool, "VAR-P").await, 1);
    assert_eq!(
        product_stock(&pool, "prod-v").await,
        7,
        "aggregate must mirror the variant decrement"
    );
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn insufficient_stock_rejects_without_side_effects(pool: sqlx::PgPool) {
    insert_test_product(&pool, "prod-low", "MATE-032", 2).await;

    let err = place_order(
        &pool,
        &order_request("ana@example.com", vec![cart_line("prod-low", None, 5)]),
        &rules(),
    )
    .await
    .expect_err("overdrawn order must be rejected");

    assert!(
        matches!(
            err,
            StoreError::InsufficientStock {
                requested: 5,
                available: 2,
                ..
            }
        ),
        "expected InsufficientStock, got {err:?}"
    );

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orders, 0, "no order row may survive a rejected placement");
    assert_eq!(product_stock(&pool, "prod-low").await, 2, "stock unchanged");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn concurrent_orders_never_oversell(pool: sqlx::PgPool) {
    insert_test_product(&pool, "prod-race", "MATE-033", 2).await;
    // Pre-seed the customer so the racing placements take the update path
    // instead of racing the unique email insert.
    upsert_customer_pool(&pool, "Ana García", "ana@example.com", None)
        .await
        .expect("seed customer failed");

    let request = order_request("ana@example.com", vec![cart_line("prod-race", None, 1)]);
    let shipping = rules();
    let (a, b, c) = tokio::join!(
        place_order(&pool, &request, &shipping),
        place_order(&pool, &request, &shipping),
        place_order(&pool, &request, &shipping),
    );

    let successes = [a.is_ok(), b.is_ok(), c.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 2, "exactly stock-many orders may succeed");
    assert_eq!(product_stock(&pool, "prod-race").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn concurrent_variant_orders_never_oversell(pool: sqlx::PgPool) {
    apply_product_webhook(
        &pool,
        &webhook(
            "prod-vrace",
            "MATE-034",
            Some(vec![variant("VAR-RACE", "M", 2)]),
        ),
    )
    .await
    .expect("webhook failed");
    let variant_id =
        sqlx::query_scalar::<_, i64>("SELECT id FROM product_variants WHERE sku = 'VAR-RACE'")
            .fetch_one(&pool)
            .await
            .expect("variant lookup failed");
    // Pre-seed the customer so the racing placements take the update path
    // instead of racing the unique email insert.
    upsert_customer_pool(&pool, "Ana García", "ana@example.com", None)
        .await
        .expect("seed customer failed");

    let request = order_request(
        "ana@example.com",
        vec![cart_line("prod-vrace", Some(variant_id), 1)],
    );
    let shipping = rules();
    let results = tokio::join!(
        place_order(&pool, &request, &shipping),
        place_order(&pool, &request, &shipping),
        place_order(&pool, &request, &shipping),
    );
    let results = [results.0, results.1, results.2];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 2, "exactly stock-many orders may succeed");
    for rejected in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            rejected.as_ref().unwrap_err(),
            StoreError::InsufficientStock { .. }
        ));
    }
    assert_eq!(variant_stock(&pool, "VAR-RACE").await, 0);
    assert_eq!(product_stock(&pool, "prod-vrace").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn webhook_steal_racing_placement_never_deadlocks(pool: sqlx::PgPool) {
    apply_product_webhook(
        &pool,
        &webhook(
            "prod-own",
            "MATE-035",
            Some(vec![variant("VAR-MOVE", "M", 5)]),
        ),
    )
    .await
    .expect("seed webhook failed");
    let variant_id =
        sqlx::query_scalar::<_, i64>("SELECT id FROM product_variants WHERE sku = 'VAR-MOVE'")
            .fetch_one(&pool)
            .await
            .expect("variant lookup failed");
    upsert_customer_pool(&pool, "Ana García", "ana@example.com", None)
        .await
        .expect("seed customer failed");

    // The webhook re-parents VAR-MOVE while a placement decrements it under
    // its original owner. Either side may win the race; neither may abort
    // with a database error.
    let request = order_request(
        "ana@example.com",
        vec![cart_line("prod-own", Some(variant_id), 1)],
    );
    let steal = webhook(
        "prod-thief",
        "MATE-036",
        Some(vec![variant("VAR-MOVE", "M", 5)]),
    );
    let shipping = rules();
    let (placed, stolen) = tokio::join!(
        place_order(&pool, &request, &shipping),
        apply_product_webhook(&pool, &steal),
    );

    stolen.expect("webhook must not abort");
    match placed {
        Ok(_)
        | Err(StoreError::InsufficientStock { .. })
        | Err(StoreError::VariantNotFound { .. }) => {}
        Err(other) => panic!("placement hit an unexpected error: {other}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn unknown_product_in_cart_is_rejected(pool: sqlx::PgPool) {
    let err = place_order(
        &pool,
        &order_request("ana@example.com", vec![cart_line("prod-missing", None, 1)]),
        &rules(),
    )
    .await
    .expect_err("unknown product must be rejected");
    assert!(matches!(err, StoreError::ProductNotFound(_)));
}

// ---------------------------------------------------------------------------
// Section 4: Confirmation gate persistence
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn payment_reference_is_first_write_wins(pool: sqlx::PgPool) {
    insert_test_product(&pool, "prod-pay", "MATE-040", 5).await;
    let placed = place_order(
        &pool,
        &order_request("ana@example.com", vec![cart_line("prod-pay", None, 1)]),
        &rules(),
    )
    .await
    .expect("place_order failed");

    set_payment_reference(&pool, placed.order.id, "pay-first")
        .await
        .expect("first reference failed");
    set_payment_reference(&pool, placed.order.id, "pay-second")
        .await
        .expect("second reference should be a no-op, not an error");

    let (order, _, _) = get_order(&pool, placed.order.id).await.expect("get failed");
    assert_eq!(order.payment_id.as_deref(), Some("pay-first"));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn mark_paid_transitions_exactly_once(pool: sqlx::PgPool) {
    insert_test_product(&pool, "prod-paid", "MATE-041", 5).await;
    let placed = place_order(
        &pool,
        &order_request("ana@example.com", vec![cart_line("prod-paid", None, 1)]),
        &rules(),
    )
    .await
    .expect("place_order failed");

    let first = mark_paid_once(&pool, placed.order.id).await.expect("first failed");
    let second = mark_paid_once(&pool, placed.order.id).await.expect("second failed");
    assert!(first, "first confirmation performs the transition");
    assert!(!second, "re-confirmation must not report a transition");

    let (order, _, _) = get_order(&pool, placed.order.id).await.expect("get failed");
    assert_eq!(order.status, "paid");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn mark_paid_unknown_order_errors(pool: sqlx::PgPool) {
    let err = mark_paid_once(&pool, 999_999)
        .await
        .expect_err("unknown order must error");
    assert!(matches!(err, StoreError::OrderNotFound(999_999)));
}

// ---------------------------------------------------------------------------
// Section 5: Customer-facing lookup
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn viewer_lookup_accepts_matching_email_case_insensitively(pool: sqlx::PgPool) {
    insert_test_product(&pool, "prod-view", "MATE-050", 5).await;
    let placed = place_order(
        &pool,
        &order_request("Ana@Example.com", vec![cart_line("prod-view", None, 1)]),
        &rules(),
    )
    .await
    .expect("place_order failed");

    let found = find_order_for_viewer(
        &pool,
        placed.order.id,
        OrderAccess::Email("ana@example.com"),
    )
    .await;
    assert!(found.is_ok());

    let denied = find_order_for_viewer(
        &pool,
        placed.order.id,
        OrderAccess::Email("otra@example.com"),
    )
    .await
    .expect_err("wrong email must be denied");
    assert!(
        matches!(denied, StoreError::OrderNotFound(_)),
        "a failed claim must be indistinguishable from a missing order"
    );
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn line_views_degrade_to_ephemeral_after_product_deletion(pool: sqlx::PgPool) {
    insert_test_product(&pool, "prod-del", "MATE-051", 5).await;
    let placed = place_order(
        &pool,
        &order_request("ana@example.com", vec![cart_line("prod-del", None, 2)]),
        &rules(),
    )
    .await
    .expect("place_order failed");

    let before = order_line_views(&pool, placed.order.id).await.expect("views failed");
    assert!(matches!(before[0], OrderLineView::Persisted { .. }));

    delete_product(&pool, "prod-del").await.expect("delete failed");

    let after = order_line_views(&pool, placed.order.id).await.expect("views failed");
    assert!(
        matches!(after[0], OrderLineView::Ephemeral { .. }),
        "orphaned line must degrade, not disappear"
    );
    assert_eq!(after[0].quantity(), 2);
}

// ---------------------------------------------------------------------------
// Section 6: Customers
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn customer_upsert_matches_email_case_insensitively(pool: sqlx::PgPool) {
    let first = upsert_customer_pool(&pool, "Ana García", "ana@example.com", None)
        .await
        .expect("first upsert failed");
    let second = upsert_customer_pool(&pool, "Ana M. García", "ANA@EXAMPLE.COM", Some("+54911"))
        .await
        .expect("second upsert failed");

    assert_eq!(first.id, second.id, "same email must map to one customer");
    assert_eq!(second.full_name, "Ana M. García", "latest name wins");
    assert_eq!(second.phone.as_deref(), Some("+54911"));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

// ---------------------------------------------------------------------------
// Section 7: Admin operations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn delete_product_cascades_and_errors_on_unknown_id(pool: sqlx::PgPool) {
    apply_product_webhook(
        &pool,
        &webhook("prod-gone", "MATE-060", Some(vec![variant("VAR-G", "S", 2)])),
    )
    .await
    .expect("webhook failed");

    delete_product(&pool, "prod-gone").await.expect("delete failed");

    let variants: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM product_variants WHERE product_id = 'prod-gone'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(variants, 0);

    let err = delete_product(&pool, "prod-gone")
        .await
        .expect_err("second delete must error");
    assert!(matches!(err, StoreError::ProductNotFound(_)));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn price_override_is_persisted_and_clearable(pool: sqlx::PgPool) {
    insert_test_product(&pool, "prod-price", "MATE-061", 5).await;

    set_price_override(&pool, "prod-price", Some("999.00".parse().unwrap()), 0)
        .await
        .expect("set override failed");
    let (product, _, _) = get_product(&pool, "prod-price").await.expect("get failed");
    assert_eq!(product.price_override, Some("999.00".parse().unwrap()));

    set_price_override(&pool, "prod-price", None, 25)
        .await
        .expect("clear override failed");
    let (product, _, _) = get_product(&pool, "prod-price").await.expect("get failed");
    assert!(product.price_override.is_none());
    assert_eq!(product.discount_percentage, 25);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn recompute_all_aggregates_repairs_drift(pool: sqlx::PgPool) {
    apply_product_webhook(
        &pool,
        &webhook("prod-drift", "MATE-062", Some(vec![variant("VAR-D", "S", 8)])),
    )
    .await
    .expect("webhook failed");

    // Simulate drift by corrupting the aggregate directly.
    sqlx::query("UPDATE products SET stock = 42 WHERE id = 'prod-drift'")
        .execute(&pool)
        .await
        .unwrap();

    let repaired = recompute_all_aggregates(&pool).await.expect("recompute failed");
    assert_eq!(repaired, 1);
    assert_eq!(product_stock(&pool, "prod-drift").await, 8);

    let idle = recompute_all_aggregates(&pool).await.expect("recompute failed");
    assert_eq!(idle, 0, "a consistent catalog needs no repairs");
}

// ---------------------------------------------------------------------------
// Section 8: Storefront reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a provisioned Postgres"]
async fn listing_filters_inactive_products_and_searches_by_name(pool: sqlx::PgPool) {
    insert_test_product(&pool, "prod-a", "MATE-070", 5).await;
    insert_test_product(&pool, "prod-b", "BOMBILLA-071", 5).await;
    sqlx::query("UPDATE products SET is_active = FALSE WHERE id = 'prod-b'")
        .execute(&pool)
        .await
        .unwrap();

    let page = list_products(&pool, &ProductFilters {
        category: None,
        search: None,
        offset: 0,
        limit: 20,
    })
    .await
    .expect("list failed");
    assert_eq!(page.total, 1, "inactive products are hidden");
    assert_eq!(page.items[0].id, "prod-a");

    let searched = list_products(&pool, &ProductFilters {
        category: None,
        search: Some("mate-070".to_string()),
        offset: 0,
        limit: 20,
    })
    .await
    .expect("search failed");
    assert_eq!(searched.total, 1);
}
