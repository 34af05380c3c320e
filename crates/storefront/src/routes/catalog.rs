//! Category and product listing.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::CatalogRepository;
use crate::db::catalog::ProductFilter;
use crate::error::{AppError, Result};
use crate::models::{Category, Product};
use crate::state::AppState;

/// Query parameters for `GET /api/products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    /// Category slug.
    pub category: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

/// Active categories in display order.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = CatalogRepository::new(state.pool()).list_categories().await?;
    Ok(Json(categories))
}

/// Active products, optionally narrowed to a category or to featured ones.
#[instrument(skip(state))]
pub async fn products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let filter = ProductFilter {
        category: query.category.filter(|c| !c.trim().is_empty()),
        featured: query.featured,
    };
    let products = CatalogRepository::new(state.pool())
        .list_products(&filter)
        .await?;
    Ok(Json(products))
}

/// Product detail by slug. Inactive products are not found.
#[instrument(skip(state))]
pub async fn product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    CatalogRepository::new(state.pool())
        .get_product_by_slug(&slug)
        .await?
        .filter(|p| p.is_active)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))
}
