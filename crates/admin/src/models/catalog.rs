//! Categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use bloomtable_core::{CategoryId, ProductId, Slug};

use super::{optional_text, required_text, resolve_slug};

const MAX_NAME_LENGTH: usize = 120;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for creating or replacing a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A category input that passed validation.
#[derive(Debug, Clone)]
pub struct ValidCategory {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
}

impl CategoryInput {
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(self) -> Result<ValidCategory, String> {
        let name = required_text(&self.name, "name", MAX_NAME_LENGTH)?;
        let slug = resolve_slug(self.slug.as_deref(), &name)?;
        Ok(ValidCategory {
            name,
            slug,
            description: optional_text(self.description),
            sort_order: self.sort_order,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for creating or replacing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone)]
pub struct ValidProduct {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
}

impl ProductInput {
    /// Prices are stored as `NUMERIC(10, 2)`.
    pub const MAX_PRICE: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);

    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(self) -> Result<ValidProduct, String> {
        let name = required_text(&self.name, "name", MAX_NAME_LENGTH)?;
        let slug = resolve_slug(self.slug.as_deref(), &name)?;
        if self.price.is_sign_negative() {
            return Err("price cannot be negative".into());
        }
        if self.price > Self::MAX_PRICE {
            return Err(format!("price cannot exceed {}", Self::MAX_PRICE));
        }
        Ok(ValidProduct {
            category_id: self.category_id,
            name,
            slug,
            description: optional_text(self.description),
            price: self.price.round_dp(2),
            image_url: optional_text(self.image_url),
            is_active: self.is_active,
            is_featured: self.is_featured,
            sort_order: self.sort_order,
        })
    }
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(json: serde_json::Value) -> ProductInput {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_category_defaults_and_slug() {
        let input: CategoryInput =
            serde_json::from_value(serde_json::json!({ "name": "Wedding Flowers" })).unwrap();
        let valid = input.validate().unwrap();
        assert_eq!(valid.slug.as_str(), "wedding-flowers");
        assert!(valid.is_active);
        assert_eq!(valid.sort_order, 0);
    }

    #[test]
    fn test_product_price_rules() {
        assert!(
            product(serde_json::json!({ "name": "Rose", "price": "-1.00" }))
                .validate()
                .is_err()
        );
        assert!(
            product(serde_json::json!({ "name": "Rose", "price": "1000000.00" }))
                .validate()
                .is_err()
        );
        let valid = product(serde_json::json!({ "name": "Rose", "price": "4.505" }))
            .validate()
            .unwrap();
        assert_eq!(valid.price, Decimal::new(450, 2));
        assert_eq!(valid.slug.as_str(), "rose");
    }

    #[test]
    fn test_product_blank_optionals_become_none() {
        let valid = product(serde_json::json!({
            "name": "Lily", "price": "3.00", "description": "  ", "image_url": ""
        }))
        .validate()
        .unwrap();
        assert!(valid.description.is_none());
        assert!(valid.image_url.is_none());
    }
}
