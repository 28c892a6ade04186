//! Product route handlers.
//!
//! The featured list and product detail are public; everything else needs
//! an admin.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use bazaar_core::ProductId;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Product, ProductPatch};
use crate::state::AppState;

use super::JsonBody;

/// Every product.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Value>> {
    let products = state.catalog().list_products().await?;
    Ok(Json(json!({ "products": products })))
}

/// The featured products, served from the cache when possible.
pub async fn featured(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().featured().await?))
}

/// One product.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().get_product(id).await?))
}

/// Add a product.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(input): JsonBody<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.catalog().create_product(input).await?;
    tracing::info!(admin_id = %admin.id, product_id = %product.id, "Admin created product");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Change some fields of a product.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    JsonBody(patch): JsonBody<ProductPatch>,
) -> Result<Json<Product>> {
    let product = state.catalog().update_product(id, patch).await?;
    tracing::info!(admin_id = %admin.id, product_id = %id, "Admin updated product");
    Ok(Json(product))
}

/// Flip the featured flag.
pub async fn toggle_featured(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = state.catalog().toggle_featured(id).await?;
    tracing::info!(
        admin_id = %admin.id,
        product_id = %id,
        featured = product.is_featured,
        "Admin toggled featured flag"
    );
    Ok(Json(product))
}

/// Remove a product.
pub async fn destroy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Value>> {
    state.catalog().delete_product(id).await?;
    tracing::info!(admin_id = %admin.id, product_id = %id, "Admin deleted product");
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}
