//! Integration endpoints fed by the management platform: bulk sync and the
//! single-product webhook.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use tienda_core::{SyncProductRecord, WebhookProductPayload};

use crate::middleware::RequestId;

use super::{map_db_error, map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct SyncRequest {
    products: Vec<SyncProductRecord>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncResult {
    created: u32,
    updated: u32,
    errors: u32,
}

pub(super) async fn sync_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<ApiResponse<SyncResult>>, ApiError> {
    let summary = tienda_db::sync_products(&state.pool, &request.products)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        errors = summary.errors,
        "bulk sync completed"
    );

    Ok(Json(ApiResponse {
        data: SyncResult {
            created: summary.created,
            updated: summary.updated,
            errors: summary.errors,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct WebhookResult {
    id: String,
    variants_processed: usize,
}

pub(super) async fn product_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(payload): Json<WebhookProductPayload>,
) -> Result<Json<ApiResponse<WebhookResult>>, ApiError> {
    let outcome = tienda_db::apply_product_webhook(&state.pool, &payload)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: WebhookResult {
            id: outcome.product_id,
            variants_processed: outcome.variants_processed,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
