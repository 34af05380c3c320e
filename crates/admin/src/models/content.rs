//! Gallery images, content sections and comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use bloomtable_core::{CommentId, ContentSectionId, GalleryImageId};

use super::{optional_text, required_text};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GalleryImage {
    pub id: GalleryImageId,
    pub title: String,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GalleryImageInput {
    pub title: String,
    pub image_url: String,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl GalleryImageInput {
    /// # Errors
    ///
    /// Returns a message if the title or image URL is blank.
    pub fn validate(self) -> Result<Self, String> {
        Ok(Self {
            title: required_text(&self.title, "title", 200)?,
            image_url: required_text(&self.image_url, "image_url", 2_048)?,
            alt_text: optional_text(self.alt_text),
            ..self
        })
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContentSection {
    pub id: ContentSectionId,
    pub key: String,
    pub title: String,
    pub body: String,
    pub data: Value,
    pub is_published: bool,
    pub sort_order: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentSectionInput {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl ContentSectionInput {
    pub const MAX_KEY_LENGTH: usize = 64;

    /// # Errors
    ///
    /// Returns a message if the key is blank or has characters other than
    /// ASCII letters, digits, `-` and `_`, or if the title is blank.
    pub fn validate(self) -> Result<Self, String> {
        let key = required_text(&self.key, "key", Self::MAX_KEY_LENGTH)?;
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("key may only contain letters, digits, '-' and '_'".into());
        }
        Ok(Self {
            key,
            title: required_text(&self.title, "title", 200)?,
            ..self
        })
    }
}

/// A comment with moderation state. The fingerprint stays in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub author_name: String,
    pub body: String,
    pub rating: Option<i16>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

const fn default_true() -> bool {
    true
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_section_key_rules() {
        let ok: ContentSectionInput =
            serde_json::from_value(json!({ "key": "menu_intro", "title": "Menu" })).unwrap();
        let ok = ok.validate().unwrap();
        assert_eq!(ok.data, json!({}));
        assert!(ok.is_published);

        let bad: ContentSectionInput =
            serde_json::from_value(json!({ "key": "menu intro", "title": "Menu" })).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_gallery_requires_url() {
        let input: GalleryImageInput =
            serde_json::from_value(json!({ "title": "Storefront", "image_url": " " })).unwrap();
        assert!(input.validate().is_err());
    }
}
