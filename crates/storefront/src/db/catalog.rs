//! Read-only catalog queries.

use sqlx::PgPool;
use tracing::instrument;

use bloomtable_core::ProductId;

use super::RepositoryError;
use crate::models::{Category, Product};

const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.name, p.slug, p.description, p.price, \
     p.image_url, p.is_active, p.is_featured, p.sort_order, p.updated_at";

/// Filters for [`CatalogRepository::list_products`].
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Only featured products.
    pub featured: bool,
}

/// Repository for public catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active categories in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, Category>(
            r"
            SELECT id, name, slug, description, sort_order
            FROM categories
            WHERE is_active
            ORDER BY sort_order, name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Active products, optionally narrowed to a category or to featured items.
    ///
    /// Products in an inactive category are hidden.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE p.is_active
              AND (c.id IS NULL OR c.is_active)
              AND ($1::text IS NULL OR c.slug = $1)
              AND (NOT $2 OR p.is_featured)
            ORDER BY p.sort_order, p.name
            "
        );

        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(filter.category.as_deref())
            .bind(filter.featured)
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }

    /// A single active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = $1 AND p.is_active");

        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;

        Ok(row)
    }

    /// Look up several products at once (active or not), for pricing a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ANY($1)");

        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(raw)
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }
}
