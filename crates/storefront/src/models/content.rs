//! Site content rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use bloomtable_core::{CommentId, ContentSectionId, GalleryImageId};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GalleryImage {
    pub id: GalleryImageId,
    pub title: String,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub sort_order: i32,
}

/// A named block of page content (e.g. `menu-intro`, `catering`).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContentSection {
    pub id: ContentSectionId,
    pub key: String,
    pub title: String,
    pub body: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

/// An approved guest comment. The fingerprint is never exposed.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub author_name: String,
    pub body: String,
    pub rating: Option<i16>,
    pub created_at: DateTime<Utc>,
}

/// Comment submission body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub author_name: String,
    pub body: String,
    pub rating: Option<i16>,
}

impl NewComment {
    pub const MAX_NAME_LENGTH: usize = 80;
    pub const MAX_BODY_LENGTH: usize = 2_000;

    /// Trim fields and check their bounds.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message naming the offending field.
    pub fn validate(self) -> Result<Self, String> {
        let author_name = self.author_name.trim().to_owned();
        let body = self.body.trim().to_owned();

        if author_name.is_empty() {
            return Err("name is required".into());
        }
        if author_name.chars().count() > Self::MAX_NAME_LENGTH {
            return Err(format!(
                "name must be at most {} characters",
                Self::MAX_NAME_LENGTH
            ));
        }
        if body.is_empty() {
            return Err("comment is required".into());
        }
        if body.chars().count() > Self::MAX_BODY_LENGTH {
            return Err(format!(
                "comment must be at most {} characters",
                Self::MAX_BODY_LENGTH
            ));
        }
        if let Some(rating) = self.rating
            && !(1..=5).contains(&rating)
        {
            return Err("rating must be between 1 and 5".into());
        }

        Ok(Self {
            author_name,
            body,
            rating: self.rating,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn comment(name: &str, body: &str, rating: Option<i16>) -> NewComment {
        NewComment {
            author_name: name.into(),
            body: body.into(),
            rating,
        }
    }

    #[test]
    fn test_validate_trims() {
        let c = comment("  Ana ", " Lovely peonies! ", Some(5))
            .validate()
            .unwrap();
        assert_eq!(c.author_name, "Ana");
        assert_eq!(c.body, "Lovely peonies!");
    }

    #[test]
    fn test_validate_rejects_blank_and_bad_rating() {
        assert!(comment("   ", "hi", None).validate().is_err());
        assert!(comment("Ana", "   ", None).validate().is_err());
        assert!(comment("Ana", "hi", Some(0)).validate().is_err());
        assert!(comment("Ana", "hi", Some(6)).validate().is_err());
        assert!(comment("Ana", &"x".repeat(2_001), None).validate().is_err());
    }
}
