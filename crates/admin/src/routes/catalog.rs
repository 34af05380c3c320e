//! Category and product management.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use bloomtable_core::{CategoryId, ProductId};

use crate::db::{CategoryRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryInput, Product, ProductInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(show_product).put(update_product).delete(delete_product),
        )
}

async fn list_categories(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list().await?))
}

#[instrument(skip(state, input), fields(name = %input.name))]
async fn create_category(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let valid = input.validate().map_err(AppError::BadRequest)?;
    let category = CategoryRepository::new(state.pool()).create(&valid).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, input))]
async fn update_category(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>> {
    let valid = input.validate().map_err(AppError::BadRequest)?;
    Ok(Json(
        CategoryRepository::new(state.pool()).update(id, &valid).await?,
    ))
}

#[instrument(skip(state))]
async fn delete_category(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ProductListQuery {
    category: Option<CategoryId>,
}

async fn list_products(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(
        ProductRepository::new(state.pool())
            .list(query.category)
            .await?,
    ))
}

async fn show_product(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(ProductRepository::new(state.pool()).get(id).await?))
}

#[instrument(skip(state, input), fields(name = %input.name))]
async fn create_product(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let valid = input.validate().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool()).create(&valid).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, input))]
async fn update_product(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>> {
    let valid = input.validate().map_err(AppError::BadRequest)?;
    Ok(Json(
        ProductRepository::new(state.pool()).update(id, &valid).await?,
    ))
}

#[instrument(skip(state))]
async fn delete_product(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
