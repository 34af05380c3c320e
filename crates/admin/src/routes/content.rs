//! Gallery, content sections and comment moderation.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use tracing::instrument;

use bloomtable_core::{CommentId, ContentSectionId, GalleryImageId};

use crate::db::{CommentRepository, GalleryRepository, SectionRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Comment, ContentSection, ContentSectionInput, GalleryImage, GalleryImageInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/gallery", get(list_gallery).post(create_gallery_image))
        .route(
            "/gallery/{id}",
            put(update_gallery_image).delete(delete_gallery_image),
        )
        .route("/content", get(list_sections).post(create_section))
        .route("/content/{id}", put(update_section).delete(delete_section))
        .route("/comments", get(list_comments))
        .route("/comments/{id}", delete(delete_comment))
        .route("/comments/{id}/approve", post(approve_comment))
}

async fn list_gallery(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<GalleryImage>>> {
    Ok(Json(GalleryRepository::new(state.pool()).list().await?))
}

#[instrument(skip(state, input))]
async fn create_gallery_image(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<GalleryImageInput>,
) -> Result<(StatusCode, Json<GalleryImage>)> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let image = GalleryRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

#[instrument(skip(state, input))]
async fn update_gallery_image(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<GalleryImageId>,
    Json(input): Json<GalleryImageInput>,
) -> Result<Json<GalleryImage>> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    Ok(Json(
        GalleryRepository::new(state.pool()).update(id, &input).await?,
    ))
}

async fn delete_gallery_image(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<GalleryImageId>,
) -> Result<StatusCode> {
    GalleryRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sections(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<ContentSection>>> {
    Ok(Json(SectionRepository::new(state.pool()).list().await?))
}

#[instrument(skip(state, input), fields(key = %input.key))]
async fn create_section(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<ContentSectionInput>,
) -> Result<(StatusCode, Json<ContentSection>)> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let section = SectionRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(section)))
}

#[instrument(skip(state, input))]
async fn update_section(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ContentSectionId>,
    Json(input): Json<ContentSectionInput>,
) -> Result<Json<ContentSection>> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    Ok(Json(
        SectionRepository::new(state.pool()).update(id, &input).await?,
    ))
}

async fn delete_section(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ContentSectionId>,
) -> Result<StatusCode> {
    SectionRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CommentQuery {
    approved: Option<bool>,
}

async fn list_comments(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<CommentQuery>,
) -> Result<Json<Vec<Comment>>> {
    Ok(Json(
        CommentRepository::new(state.pool())
            .list(query.approved)
            .await?,
    ))
}

async fn approve_comment(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
) -> Result<Json<Comment>> {
    Ok(Json(CommentRepository::new(state.pool()).approve(id).await?))
}

async fn delete_comment(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
) -> Result<StatusCode> {
    CommentRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
