//! Storefront product reads.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: String,
    sku: String,
    name: String,
    description: Option<String>,
    price: Decimal,
    /// Price after the admin override/discount layer; equals `price` when
    /// neither is set.
    effective_price: Decimal,
    stock: i32,
    image_url: Option<String>,
    is_active: bool,
    updated_at: DateTime<Utc>,
}

impl From<tienda_db::ProductRow> for ProductItem {
    fn from(row: tienda_db::ProductRow) -> Self {
        let effective =
            tienda_core::effective_price(row.price, row.price_override, row.discount_percentage);
        Self {
            id: row.id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            price: row.price,
            effective_price: effective,
            stock: row.stock,
            image_url: row.image_url,
            is_active: row.is_active,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    category: Option<String>,
    search: Option<String>,
    skip: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductPage {
    items: Vec<ProductItem>,
    total: i64,
    page: i64,
    limit: i64,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<ProductPage>>, ApiError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let skip = query.skip.unwrap_or(0).max(0);

    let page = tienda_db::list_products(
        &state.pool,
        &tienda_db::ProductFilters {
            category: query.category,
            search: query.search,
            offset: skip,
            limit,
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ProductPage {
            items: page.items.into_iter().map(ProductItem::from).collect(),
            total: page.total,
            page: skip / limit + 1,
            limit,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct VariantItem {
    id: i64,
    sku: String,
    size: Option<String>,
    color: Option<String>,
    stock: i32,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductDetail {
    #[serde(flatten)]
    product: ProductItem,
    variants: Vec<VariantItem>,
    images: Vec<String>,
}

pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<String>,
) -> Result<Json<ApiResponse<ProductDetail>>, ApiError> {
    let (product, variants, images) = tienda_db::get_product(&state.pool, &product_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ProductDetail {
            product: ProductItem::from(product),
            variants: variants
                .into_iter()
                .map(|v| VariantItem {
                    id: v.id,
                    sku: v.sku,
                    size: v.size,
                    color: v.color,
                    stock: v.stock,
                })
                .collect(),
            images: images.into_iter().map(|i| i.url).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
