//! Gallery, content section and comment moderation.

use sqlx::PgPool;
use tracing::{info, instrument};

use bloomtable_core::{CommentId, ContentSectionId, GalleryImageId};

use super::{RepositoryError, expect_rows};
use crate::models::{
    Comment, ContentSection, ContentSectionInput, GalleryImage, GalleryImageInput,
};

const GALLERY_COLUMNS: &str = "id, title, image_url, alt_text, sort_order, is_active, created_at";
const SECTION_COLUMNS: &str = "id, key, title, body, data, is_published, sort_order, updated_at";
const COMMENT_COLUMNS: &str = "id, author_name, body, rating, is_approved, created_at";

pub struct GalleryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GalleryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<GalleryImage>, RepositoryError> {
        let sql = format!("SELECT {GALLERY_COLUMNS} FROM gallery_images ORDER BY sort_order, id");
        Ok(sqlx::query_as::<_, GalleryImage>(&sql)
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: &GalleryImageInput) -> Result<GalleryImage, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO gallery_images (title, image_url, alt_text, sort_order, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {GALLERY_COLUMNS}
            "
        );
        Ok(sqlx::query_as::<_, GalleryImage>(&sql)
            .bind(&input.title)
            .bind(&input.image_url)
            .bind(input.alt_text.as_deref())
            .bind(input.sort_order)
            .bind(input.is_active)
            .fetch_one(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: GalleryImageId,
        input: &GalleryImageInput,
    ) -> Result<GalleryImage, RepositoryError> {
        let sql = format!(
            r"
            UPDATE gallery_images
            SET title = $2, image_url = $3, alt_text = $4, sort_order = $5, is_active = $6
            WHERE id = $1
            RETURNING {GALLERY_COLUMNS}
            "
        );
        sqlx::query_as::<_, GalleryImage>(&sql)
            .bind(id)
            .bind(&input.title)
            .bind(&input.image_url)
            .bind(input.alt_text.as_deref())
            .bind(input.sort_order)
            .bind(input.is_active)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn delete(&self, id: GalleryImageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM gallery_images WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }
}

pub struct SectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SectionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every section, published or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ContentSection>, RepositoryError> {
        let sql = format!("SELECT {SECTION_COLUMNS} FROM content_sections ORDER BY sort_order, key");
        Ok(sqlx::query_as::<_, ContentSection>(&sql)
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `Conflict` if the key is taken.
    #[instrument(skip(self, input), fields(key = %input.key))]
    pub async fn create(
        &self,
        input: &ContentSectionInput,
    ) -> Result<ContentSection, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO content_sections (key, title, body, data, is_published, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SECTION_COLUMNS}
            "
        );
        let section = sqlx::query_as::<_, ContentSection>(&sql)
            .bind(&input.key)
            .bind(&input.title)
            .bind(&input.body)
            .bind(&input.data)
            .bind(input.is_published)
            .bind(input.sort_order)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "content section key"))?;

        info!(section_id = %section.id, "Content section created");
        Ok(section)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `Conflict` if the key is taken.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: ContentSectionId,
        input: &ContentSectionInput,
    ) -> Result<ContentSection, RepositoryError> {
        let sql = format!(
            r"
            UPDATE content_sections
            SET key = $2, title = $3, body = $4, data = $5, is_published = $6,
                sort_order = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {SECTION_COLUMNS}
            "
        );
        sqlx::query_as::<_, ContentSection>(&sql)
            .bind(id)
            .bind(&input.key)
            .bind(&input.title)
            .bind(&input.body)
            .bind(&input.data)
            .bind(input.is_published)
            .bind(input.sort_order)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "content section key"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn delete(&self, id: ContentSectionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM content_sections WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }
}

pub struct CommentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CommentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Newest first; `approved` narrows to one moderation state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, approved: Option<bool>) -> Result<Vec<Comment>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {COMMENT_COLUMNS} FROM comments
            WHERE $1::boolean IS NULL OR is_approved = $1
            ORDER BY created_at DESC
            "
        );
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(approved)
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn approve(&self, id: CommentId) -> Result<Comment, RepositoryError> {
        let sql = format!(
            "UPDATE comments SET is_approved = TRUE WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CommentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }
}
