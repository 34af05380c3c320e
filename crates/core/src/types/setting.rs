//! Setting keys and their built-in defaults.
//!
//! Settings are JSON blobs stored by key. Site content (hero text, contact
//! details, opening hours) lives here so the admin console can edit it
//! without a schema change.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Well-known setting keys.
pub mod setting_keys {
    /// Landing page hero block.
    pub const HERO_CONTENT: &str = "heroContent";
    /// About-us copy.
    pub const ABOUT_CONTENT: &str = "aboutContent";
    /// Phone, email and address shown in the footer and contact page.
    pub const CONTACT_INFO: &str = "contactInfo";
    /// Weekly opening hours (see `BusinessHours`).
    pub const BUSINESS_HOURS: &str = "businessHours";
    /// Master switch for online ordering.
    pub const ORDERING_ENABLED: &str = "orderingEnabled";
    /// Optional site-wide banner.
    pub const ANNOUNCEMENT_BANNER: &str = "announcementBanner";
    /// Delivery fee and radius.
    pub const DELIVERY_SETTINGS: &str = "deliverySettings";

    /// Every well-known key, in seeding order.
    pub const ALL: [&str; 7] = [
        HERO_CONTENT,
        ABOUT_CONTENT,
        CONTACT_INFO,
        BUSINESS_HOURS,
        ORDERING_ENABLED,
        ANNOUNCEMENT_BANNER,
        DELIVERY_SETTINGS,
    ];
}

/// Errors that can occur when parsing a [`SettingKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingKeyError {
    #[error("setting key cannot be empty")]
    Empty,
    #[error("setting key must be at most {max} characters")]
    TooLong { max: usize },
    #[error("setting key may only contain letters, digits, '_', '.' and '-'")]
    InvalidCharacter,
}

/// A validated setting key.
///
/// Keys double as notification channel suffixes (`settings:<key>`), so they
/// are restricted to a conservative character set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct SettingKey(String);

impl SettingKey {
    /// Maximum key length.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a setting key.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingKeyError`] if the key is empty, too long or contains
    /// characters outside `[A-Za-z0-9_.-]`.
    pub fn parse(s: &str) -> Result<Self, SettingKeyError> {
        if s.is_empty() {
            return Err(SettingKeyError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SettingKeyError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(SettingKeyError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Wrap one of the [`setting_keys`] constants without re-validating it.
    #[must_use]
    pub fn from_static(key: &'static str) -> Self {
        debug_assert!(Self::parse(key).is_ok(), "invalid built-in key {key}");
        Self(key.to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `LISTEN`/`NOTIFY` channel carrying change events for this key.
    #[must_use]
    pub fn channel(&self) -> String {
        format!("settings:{}", self.0)
    }

    /// The built-in default for this key, if it has one.
    #[must_use]
    pub fn default_value(&self) -> Option<Value> {
        default_setting(&self.0)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SettingKey {
    type Error = SettingKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SettingKey> for String {
    fn from(key: SettingKey) -> Self {
        key.0
    }
}

impl std::str::FromStr for SettingKey {
    type Err = SettingKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for SettingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hardcoded default for a well-known key.
///
/// Used to lazily create the row the first time a key is read, and as the
/// fallback the storefront serves when the store is unreachable.
#[must_use]
pub fn default_setting(key: &str) -> Option<Value> {
    let value = match key {
        setting_keys::HERO_CONTENT => json!({
            "title": "Fresh flowers & seasonal plates",
            "subtitle": "Order ahead for pickup or same-day delivery",
            "ctaText": "View the menu",
            "ctaLink": "/menu",
            "imageUrl": null
        }),
        setting_keys::ABOUT_CONTENT => json!({
            "title": "About us",
            "body": ""
        }),
        setting_keys::CONTACT_INFO => json!({
            "phone": "",
            "email": "",
            "address": "",
            "instagram": null
        }),
        setting_keys::BUSINESS_HOURS => {
            serde_json::to_value(crate::BusinessHours::default()).unwrap_or(Value::Null)
        }
        setting_keys::ORDERING_ENABLED => Value::Bool(true),
        setting_keys::ANNOUNCEMENT_BANNER => json!({
            "enabled": false,
            "message": ""
        }),
        setting_keys::DELIVERY_SETTINGS => json!({
            "enabled": true,
            "fee": "5.00",
            "radiusKm": 8,
            "minimumOrder": "25.00"
        }),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_keys() {
        assert!(SettingKey::parse("heroContent").is_ok());
        assert!(SettingKey::parse("homepage.banner_v2-draft").is_ok());
    }

    #[test]
    fn test_parse_invalid_keys() {
        assert_eq!(SettingKey::parse(""), Err(SettingKeyError::Empty));
        assert_eq!(
            SettingKey::parse("hero content"),
            Err(SettingKeyError::InvalidCharacter)
        );
        assert_eq!(
            SettingKey::parse("a\"; DROP"),
            Err(SettingKeyError::InvalidCharacter)
        );
        assert!(matches!(
            SettingKey::parse(&"k".repeat(65)),
            Err(SettingKeyError::TooLong { .. })
        ));
    }

    #[test]
    fn test_from_static_matches_parse() {
        assert_eq!(
            SettingKey::from_static(setting_keys::BUSINESS_HOURS),
            SettingKey::parse("businessHours").unwrap()
        );
    }

    #[test]
    fn test_channel_name() {
        let key = SettingKey::parse("heroContent").unwrap();
        assert_eq!(key.channel(), "settings:heroContent");
    }

    #[test]
    fn test_known_keys_have_defaults() {
        for key in setting_keys::ALL {
            assert!(default_setting(key).is_some(), "missing default for {key}");
            assert!(SettingKey::parse(key).is_ok());
        }
        assert!(default_setting("unknownKey").is_none());
    }

    #[test]
    fn test_business_hours_default_deserializes() {
        let value = default_setting(setting_keys::BUSINESS_HOURS).unwrap();
        let hours: crate::BusinessHours = serde_json::from_value(value).unwrap();
        assert!(hours.validate().is_ok());
    }
}
