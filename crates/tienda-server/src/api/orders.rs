//! Checkout surface: order placement, token-gated lookup, payment
//! confirmation, shipping quotes, and the standalone customer upsert.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tienda_core::{CartLine, DeliveryMethod, OrderRequest};
use tienda_db::{OrderAccess, PlacedOrder};
use tienda_payments::{PaymentStatus, PreferenceLine};

use crate::middleware::RequestId;
use crate::notify;

use super::{map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct CustomerView {
    id: i64,
    full_name: String,
    email: String,
    phone: Option<String>,
}

impl From<tienda_db::CustomerRow> for CustomerView {
    fn from(row: tienda_db::CustomerRow) -> Self {
        Self {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct OrderItemView {
    product_id: String,
    variant_id: Option<i64>,
    quantity: i32,
    unit_price: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderView {
    id: i64,
    status: String,
    total_amount: Decimal,
    delivery_method: String,
    created_at: DateTime<Utc>,
    customer: CustomerView,
    items: Vec<OrderItemView>,
    payment_url: Option<String>,
}

fn order_view(
    order: tienda_db::OrderRow,
    customer: tienda_db::CustomerRow,
    items: Vec<tienda_db::OrderItemRow>,
) -> OrderView {
    OrderView {
        id: order.id,
        status: order.status,
        total_amount: order.total_amount,
        delivery_method: order.delivery_method,
        created_at: order.created_at,
        customer: CustomerView::from(customer),
        items: items
            .into_iter()
            .map(|i| OrderItemView {
                product_id: i.product_id,
                variant_id: i.variant_id,
                quantity: i.quantity,
                unit_price: i.unit_price,
            })
            .collect(),
        payment_url: order.payment_url,
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

pub(super) async fn create_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<OrderRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
    let placed = tienda_db::place_order(&state.pool, &request, &state.config.shipping)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    // Payment-URL creation is best-effort and runs strictly after the stock
    // transaction committed: a gateway failure leaves the order pending
    // without a URL, never rolls it back.
    let payment_url = match request_payment_url(&state, &placed).await {
        Ok(url) => {
            if let Err(e) = tienda_db::set_payment_url(&state.pool, placed.order.id, &url).await {
                tracing::warn!(order_id = placed.order.id, error = %e, "failed to persist payment URL");
            }
            Some(url)
        }
        Err(e) => {
            tracing::warn!(order_id = placed.order.id, error = %e, "payment preference creation failed");
            None
        }
    };

    let PlacedOrder {
        order,
        customer,
        items,
        ..
    } = placed;
    let mut view = order_view(order, customer, items);
    view.payment_url = payment_url;

    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Builds the itemized checkout preference (catalog lines plus a shipping
/// line when it costs anything) and asks the gateway for a URL.
async fn request_payment_url(
    state: &AppState,
    placed: &PlacedOrder,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let views = tienda_db::order_line_views(&state.pool, placed.order.id).await?;

    let mut lines: Vec<PreferenceLine> = views
        .iter()
        .map(|view| {
            PreferenceLine::new(
                view.correlation_sku(),
                view.label(),
                view.quantity(),
                view.unit_price(),
            )
        })
        .collect();

    if placed.shipping_cost > Decimal::ZERO {
        lines.push(PreferenceLine::new(
            "SHIPPING",
            "Costo de envío",
            1,
            placed.shipping_cost,
        ));
    }

    let url = state
        .payments
        .create_preference(placed.order.id, &lines)
        .await?;
    Ok(url)
}

// ---------------------------------------------------------------------------
// Lookup / tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct TrackQuery {
    payment_id: Option<String>,
    email: Option<String>,
}

pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(order_id): Path<i64>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
    let access = if let Some(reference) = query.payment_id.as_deref() {
        OrderAccess::PaymentReference(reference)
    } else if let Some(email) = query.email.as_deref() {
        OrderAccess::Email(email)
    } else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "either payment_id or email is required to view an order",
        ));
    };

    let (order, customer, items) = tienda_db::find_order_for_viewer(&state.pool, order_id, access)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: order_view(order, customer, items),
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Confirmation gate
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct ConfirmRequest {
    payment_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ConfirmResult {
    status: String,
}

pub(super) async fn confirm_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(order_id): Path<i64>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ApiResponse<ConfirmResult>>, ApiError> {
    if request.payment_id.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "payment_id must not be empty",
        ));
    }

    // First-write-wins, persisted before the gateway is consulted so the
    // reference survives as an audit/access token even if verification
    // fails or times out.
    tienda_db::set_payment_reference(&state.pool, order_id, &request.payment_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    let status = match state.payments.get_payment_status(&request.payment_id).await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(order_id, error = %e, "payment status lookup failed");
            PaymentStatus::Other("unknown".to_string())
        }
    };

    if status != PaymentStatus::Approved {
        tracing::info!(order_id, status = status.as_str(), "payment not approved yet");
        return Ok(Json(ApiResponse {
            data: ConfirmResult {
                status: status.as_str().to_string(),
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let transitioned = tienda_db::mark_paid_once(&state.pool, order_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    // Side effects fire exactly once, on the call that performed the
    // transition; a repeat confirmation is a successful no-op.
    if transitioned {
        notify::fire_confirmation_effects(&state, order_id, &request.payment_id).await;
    }

    Ok(Json(ApiResponse {
        data: ConfirmResult {
            status: "paid".to_string(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Shipping quote
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct QuoteRequest {
    items: Vec<CartLine>,
    delivery_method: DeliveryMethod,
}

#[derive(Debug, Serialize)]
pub(super) struct QuoteResult {
    cost: Decimal,
    message: &'static str,
}

pub(super) async fn quote_shipping(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<ApiResponse<QuoteResult>>, ApiError> {
    let total: Decimal = request
        .items
        .iter()
        .map(|line| Decimal::from(line.quantity) * line.unit_price)
        .sum();

    let rules = &state.config.shipping;
    let cost = rules.cost(total, request.delivery_method);

    Ok(Json(ApiResponse {
        data: QuoteResult {
            cost,
            message: rules.describe(cost, request.delivery_method),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct CustomerUpsertRequest {
    full_name: String,
    email: String,
    phone: Option<String>,
}

pub(super) async fn upsert_customer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<CustomerUpsertRequest>,
) -> Result<Json<ApiResponse<CustomerView>>, ApiError> {
    if request.email.trim().is_empty() || request.full_name.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "full_name and email are required",
        ));
    }

    let customer = tienda_db::upsert_customer_pool(
        &state.pool,
        &request.full_name,
        &request.email,
        request.phone.as_deref(),
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "customer upsert failed");
        ApiError::new(req_id.0.clone(), "internal_error", "customer upsert failed")
    })?;

    Ok(Json(ApiResponse {
        data: CustomerView::from(customer),
        meta: ResponseMeta::new(req_id.0),
    }))
}
