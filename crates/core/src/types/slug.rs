//! URL slug type for products and categories.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must be at most {max} characters")]
    TooLong { max: usize },
    #[error("slug may only contain lowercase letters, digits and hyphens")]
    InvalidCharacter,
    #[error("slug cannot start or end with a hyphen or contain consecutive hyphens")]
    MisplacedHyphen,
}

/// A URL-safe identifier such as `spring-bouquet`.
///
/// ## Constraints
///
/// - Length: 1-96 characters
/// - Only `a-z`, `0-9` and `-`
/// - No leading, trailing or doubled hyphens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum length of a slug.
    pub const MAX_LENGTH: usize = 96;

    /// Parse a `Slug` from a string.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] describing the first violated constraint.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(SlugError::InvalidCharacter);
        }
        if s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::MisplacedHyphen);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a display name ("Spring Bouquet!" -> `spring-bouquet`).
    ///
    /// Non-ASCII-alphanumeric runs collapse into a single hyphen.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the title has no ASCII letters or digits.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_hyphen = false;
        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }
        if out.len() > Self::MAX_LENGTH {
            out.truncate(Self::MAX_LENGTH);
            while out.ends_with('-') {
                out.pop();
            }
        }
        Self::parse(&out)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Slug::parse("roses").is_ok());
        assert!(Slug::parse("spring-bouquet-2").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert_eq!(Slug::parse("Roses"), Err(SlugError::InvalidCharacter));
        assert_eq!(Slug::parse("a b"), Err(SlugError::InvalidCharacter));
        assert_eq!(Slug::parse("-roses"), Err(SlugError::MisplacedHyphen));
        assert_eq!(Slug::parse("roses-"), Err(SlugError::MisplacedHyphen));
        assert_eq!(Slug::parse("red--roses"), Err(SlugError::MisplacedHyphen));
        assert!(matches!(
            Slug::parse(&"a".repeat(97)),
            Err(SlugError::TooLong { .. })
        ));
    }

    #[test]
    fn test_from_title() {
        assert_eq!(
            Slug::from_title("Spring Bouquet!").unwrap().as_str(),
            "spring-bouquet"
        );
        assert_eq!(
            Slug::from_title("  Chef's  Tasting -- Menu ").unwrap().as_str(),
            "chef-s-tasting-menu"
        );
        assert_eq!(Slug::from_title("***"), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_title_truncates() {
        let slug = Slug::from_title(&"ab ".repeat(60)).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Slug>("\"tulips\"").is_ok());
        assert!(serde_json::from_str::<Slug>("\"Tulips\"").is_err());
    }
}
