//! Category and product CRUD.

use sqlx::PgPool;
use tracing::{info, instrument};

use bloomtable_core::{CategoryId, ProductId};

use super::{RepositoryError, expect_rows};
use crate::models::catalog::{ValidCategory, ValidProduct};
use crate::models::{Category, Product};

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, sort_order, is_active, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, category_id, name, slug, description, price, image_url, \
     is_active, is_featured, sort_order, created_at, updated_at";

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories, active or not, in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_order, name");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create(&self, input: &ValidCategory) -> Result<Category, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO categories (name, slug, description, sort_order, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CATEGORY_COLUMNS}
            "
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(&input.name)
            .bind(input.slug.as_str())
            .bind(input.description.as_deref())
            .bind(input.sort_order)
            .bind(input.is_active)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "category slug"))?;

        info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `Conflict` if the slug is taken.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: CategoryId,
        input: &ValidCategory,
    ) -> Result<Category, RepositoryError> {
        let sql = format!(
            r"
            UPDATE categories
            SET name = $2, slug = $3, description = $4, sort_order = $5,
                is_active = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(input.slug.as_str())
            .bind(input.description.as_deref())
            .bind(input.sort_order)
            .bind(input.is_active)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "category slug"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a category. Its products stay, uncategorized.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }
}

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every product, optionally within one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, category: Option<CategoryId>) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE $1::int IS NULL OR category_id = $1
            ORDER BY sort_order, name
            "
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(category)
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn get(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `Conflict` if the slug is taken and `InvalidReference` if the
    /// category does not exist.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create(&self, input: &ValidProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO products (
                category_id, name, slug, description, price, image_url,
                is_active, is_featured, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(input.category_id)
            .bind(&input.name)
            .bind(input.slug.as_str())
            .bind(input.description.as_deref())
            .bind(input.price)
            .bind(input.image_url.as_deref())
            .bind(input.is_active)
            .bind(input.is_featured)
            .bind(input.sort_order)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "product slug"))?;

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Conflict` or `InvalidReference` as for `create`.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: ProductId, input: &ValidProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            UPDATE products
            SET category_id = $2, name = $3, slug = $4, description = $5, price = $6,
                image_url = $7, is_active = $8, is_featured = $9, sort_order = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(input.category_id)
            .bind(&input.name)
            .bind(input.slug.as_str())
            .bind(input.description.as_deref())
            .bind(input.price)
            .bind(input.image_url.as_deref())
            .bind(input.is_active)
            .bind(input.is_featured)
            .bind(input.sort_order)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "product slug"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Past order lines keep their copied name and price.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }
}
