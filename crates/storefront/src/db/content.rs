//! Site content: gallery, content sections and guest comments.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use bloomtable_core::CommentId;

use super::RepositoryError;
use crate::models::{Comment, ContentSection, GalleryImage, NewComment};

/// Repository for public content reads and comment submission.
pub struct ContentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active gallery images in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_gallery(&self) -> Result<Vec<GalleryImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, GalleryImage>(
            r"
            SELECT id, title, image_url, alt_text, sort_order
            FROM gallery_images
            WHERE is_active
            ORDER BY sort_order, id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// A published content section by key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_section(&self, key: &str) -> Result<Option<ContentSection>, RepositoryError> {
        let row = sqlx::query_as::<_, ContentSection>(
            r"
            SELECT id, key, title, body, data, updated_at
            FROM content_sections
            WHERE key = $1 AND is_published
            ",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Approved comments, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_approved_comments(&self, limit: i64) -> Result<Vec<Comment>, RepositoryError> {
        let rows = sqlx::query_as::<_, Comment>(
            r"
            SELECT id, author_name, body, rating, created_at
            FROM comments
            WHERE is_approved
            ORDER BY created_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// When this fingerprint last left a comment still awaiting approval.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn last_pending_from(
        &self,
        fingerprint: &str,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r"
            SELECT created_at FROM comments
            WHERE fingerprint = $1 AND NOT is_approved
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(fingerprint)
        .fetch_optional(self.pool)
        .await?;

        Ok(at)
    }

    /// Store a comment for moderation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, comment, fingerprint))]
    pub async fn insert_comment(
        &self,
        comment: &NewComment,
        fingerprint: &str,
    ) -> Result<CommentId, RepositoryError> {
        let id = sqlx::query_scalar::<_, CommentId>(
            r"
            INSERT INTO comments (author_name, body, rating, fingerprint)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(&comment.author_name)
        .bind(&comment.body)
        .bind(comment.rating)
        .bind(fingerprint)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }
}
