//! Content sections, gallery and guest comments.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use bloomtable_core::CommentId;

use crate::db::ContentRepository;
use crate::error::{AppError, Result};
use crate::middleware::ClientFingerprint;
use crate::models::{Comment, ContentSection, GalleryImage, NewComment};
use crate::state::AppState;

/// Approved comments returned per request.
const COMMENT_PAGE_SIZE: i64 = 50;

/// Minimum gap between pending comments from one client.
const COMMENT_COOLDOWN_MINUTES: i64 = 10;

/// A published content section by key.
#[instrument(skip(state))]
pub async fn section(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ContentSection>> {
    ContentRepository::new(state.pool())
        .get_section(&key)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("content section {key}")))
}

/// Active gallery images in display order.
#[instrument(skip(state))]
pub async fn gallery(State(state): State<AppState>) -> Result<Json<Vec<GalleryImage>>> {
    let images = ContentRepository::new(state.pool()).list_gallery().await?;
    Ok(Json(images))
}

/// Most recent approved comments.
#[instrument(skip(state))]
pub async fn comments(State(state): State<AppState>) -> Result<Json<Vec<Comment>>> {
    let comments = ContentRepository::new(state.pool())
        .list_approved_comments(COMMENT_PAGE_SIZE)
        .await?;
    Ok(Json(comments))
}

#[derive(Debug, Serialize)]
pub struct SubmittedComment {
    pub id: CommentId,
    pub status: &'static str,
}

/// Submit a comment for moderation.
#[instrument(skip(state, comment), fields(fingerprint = %fingerprint.as_str()))]
pub async fn submit_comment(
    State(state): State<AppState>,
    fingerprint: ClientFingerprint,
    Json(comment): Json<NewComment>,
) -> Result<(StatusCode, Json<SubmittedComment>)> {
    let comment = comment.validate().map_err(AppError::BadRequest)?;
    let repo = ContentRepository::new(state.pool());

    if let Some(last) = repo.last_pending_from(fingerprint.as_str()).await?
        && Utc::now() - last < Duration::minutes(COMMENT_COOLDOWN_MINUTES)
    {
        return Err(AppError::RateLimited(
            "please wait before leaving another comment".to_string(),
        ));
    }

    let id = repo.insert_comment(&comment, fingerprint.as_str()).await?;
    info!(comment_id = %id, "Comment submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmittedComment {
            id,
            status: "pending",
        }),
    ))
}
