//! Bearer-guarded catalog maintenance: deletion, the pricing layer, and
//! aggregate stock repair.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct DeleteResult {
    id: String,
    deleted: bool,
}

pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<String>,
) -> Result<Json<ApiResponse<DeleteResult>>, ApiError> {
    tienda_db::delete_product(&state.pool, &product_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: DeleteResult {
            id: product_id,
            deleted: true,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct PriceUpdateRequest {
    price_override: Option<Decimal>,
    #[serde(default)]
    discount_percentage: i32,
}

#[derive(Debug, Serialize)]
pub(super) struct PriceUpdateResult {
    id: String,
}

pub(super) async fn set_price_override(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<String>,
    Json(request): Json<PriceUpdateRequest>,
) -> Result<Json<ApiResponse<PriceUpdateResult>>, ApiError> {
    tienda_db::set_price_override(
        &state.pool,
        &product_id,
        request.price_override,
        request.discount_percentage,
    )
    .await
    .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PriceUpdateResult { id: product_id },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct RecomputeResult {
    products_repaired: u64,
}

pub(super) async fn recompute_stock(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<RecomputeResult>>, ApiError> {
    let repaired = tienda_db::recompute_all_aggregates(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if repaired > 0 {
        tracing::warn!(repaired, "aggregate stock drift repaired");
    }

    Ok(Json(ApiResponse {
        data: RecomputeResult {
            products_repaired: repaired,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
