mod admin;
mod catalog;
mod orders;
mod products;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};
use crate::notify::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<tienda_core::AppConfig>,
    pub payments: Arc<tienda_payments::PaymentClient>,
    pub platform: Arc<tienda_platform::PlatformClient>,
    pub mailer: Arc<dyn Mailer>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "product_not_found" | "variant_not_found" | "order_not_found" => StatusCode::NOT_FOUND,
            "insufficient_stock" => StatusCode::CONFLICT,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Maps domain errors onto the wire taxonomy. Infrastructure failures are
/// logged and collapsed into an opaque `internal_error`.
pub(super) fn map_store_error(request_id: String, error: &tienda_db::StoreError) -> ApiError {
    use tienda_db::StoreError;

    let code = match error {
        StoreError::ProductNotFound(_) => "product_not_found",
        StoreError::VariantNotFound { .. } => "variant_not_found",
        StoreError::OrderNotFound(_) => "order_not_found",
        StoreError::InsufficientStock { .. } => "insufficient_stock",
        StoreError::Invalid(_) => "validation_error",
        StoreError::Db(e) => {
            tracing::error!(error = %e, "database operation failed");
            return ApiError::new(request_id, "internal_error", "database operation failed");
        }
    };
    ApiError::new(request_id, code, error.to_string())
}

pub(super) fn map_db_error(request_id: String, error: &tienda_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/products", get(products::list_products))
        .route("/products/{product_id}", get(products::get_product))
        .route("/orders", post(orders::create_order))
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/orders/{order_id}/confirm", post(orders::confirm_order))
        .route("/shipping/quote", post(orders::quote_shipping))
        .route("/customers", post(orders::upsert_customer))
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/integration/products/sync", post(catalog::sync_products))
        .route("/webhooks/products", post(catalog::product_webhook))
        .route("/admin/products/{product_id}", delete(admin::delete_product))
        .route(
            "/admin/products/{product_id}/price",
            put(admin::set_price_override),
        )
        .route("/admin/stock/recompute", post(admin::recompute_stock))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    Router::new()
        .merge(public_router())
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match tienda_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}
