//! Rows and request bodies for the admin API.
//!
//! Admin rows include fields the storefront never exposes (inactive flags,
//! customer contact details, comment moderation state).

pub mod catalog;
pub mod content;
pub mod order;
pub mod setting;

pub use catalog::{Category, CategoryInput, Product, ProductInput, ValidCategory, ValidProduct};
pub use content::{
    Comment, ContentSection, ContentSectionInput, GalleryImage, GalleryImageInput,
};
pub use order::{Order, OrderDetail, OrderItem, OrderNotification};
pub use setting::Setting;

use bloomtable_core::Slug;

/// The explicit slug if given, otherwise one derived from `name`.
///
/// # Errors
///
/// Returns a message if the explicit slug is malformed or `name` yields none.
pub fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<Slug, String> {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => Slug::parse(slug).map_err(|e| format!("invalid slug: {e}")),
        None => Slug::from_title(name).map_err(|e| format!("cannot derive slug from name: {e}")),
    }
}

/// Trimmed, non-empty text or an error naming the field.
///
/// # Errors
///
/// Returns a message if the value is blank or longer than `max` characters.
pub fn required_text(value: &str, field: &str, max: usize) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} is required"));
    }
    if trimmed.chars().count() > max {
        return Err(format!("{field} must be at most {max} characters"));
    }
    Ok(trimmed.to_owned())
}

/// `None` for blank optional text.
#[must_use]
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_slug_derives_from_name() {
        assert_eq!(
            resolve_slug(None, "Spring Peony Bouquet").unwrap().as_str(),
            "spring-peony-bouquet"
        );
        assert_eq!(resolve_slug(Some("  "), "Tulips").unwrap().as_str(), "tulips");
    }

    #[test]
    fn test_resolve_slug_validates_explicit() {
        assert_eq!(resolve_slug(Some("lunch-menu"), "x").unwrap().as_str(), "lunch-menu");
        assert!(resolve_slug(Some("Lunch Menu"), "x").is_err());
        assert!(resolve_slug(None, "!!!").is_err());
    }

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("  Roses ", "name", 10).unwrap(), "Roses");
        assert!(required_text("   ", "name", 10).is_err());
        assert!(required_text("abcdefghijk", "name", 10).is_err());
    }
}
