//! Cart line repository.
//!
//! Persisted cart lines are scoped by `user_id` with a uniqueness constraint
//! on `(user_id, product_id)`. The constraint is the only concurrency control:
//! callers treat a unique violation on insert as an expected signal to retry
//! as an increment (see the cart service).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use opaline_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::{CartLine, ProductSnapshot};

/// Raw `cart_items` row.
#[derive(sqlx::FromRow)]
pub struct CartLineRow {
    pub id: i32,
    pub user_id: i32,
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(r: CartLineRow) -> Self {
        Self {
            id: r.id.to_string(),
            product_id: ProductId::from(r.product_id),
            product_name: r.product_name,
            product_image: r.product_image,
            unit_price: r.unit_price,
            quantity: u32::try_from(r.quantity).unwrap_or(1),
        }
    }
}

/// Repository for persisted cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's cart lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartLineRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT id, user_id, product_id, product_name, product_image,
                   unit_price, quantity, created_at
            FROM cart_items
            WHERE user_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Find a user's line for a product, if present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(
        &self,
        user_id: UserId,
        product_id: &ProductId,
    ) -> Result<Option<CartLineRow>, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT id, user_id, product_id, product_name, product_image,
                   unit_price, quantity, created_at
            FROM cart_items
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Insert a new line with the product snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a line for `(user_id, product_id)`
    /// already exists - the caller recovers by incrementing instead.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert(
        &self,
        user_id: UserId,
        product: &ProductSnapshot,
        quantity: u32,
    ) -> Result<CartLineRow, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            INSERT INTO cart_items (user_id, product_id, product_name, product_image, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, product_id, product_name, product_image,
                      unit_price, quantity, created_at
            ",
        )
        .bind(user_id.as_i32())
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.image.as_deref())
        .bind(product.price)
        .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx(e, "cart line already exists"))?;

        Ok(row)
    }

    /// Add `by` to the quantity of the user's line for a product.
    ///
    /// Returns `true` if a line was updated, `false` if none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn increment_quantity(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        by: u32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart_items
            SET quantity = quantity + $3
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_str())
        .bind(i32::try_from(by).unwrap_or(i32::MAX))
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the quantity of the user's line for a product.
    ///
    /// Returns `true` if a line was updated, `false` if none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart_items
            SET quantity = $3
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_str())
        .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the user's line for a product.
    ///
    /// Returns `true` if a line was deleted, `false` if none existed
    /// (which is not an error).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(
        &self,
        user_id: UserId,
        product_id: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM cart_items
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id.as_i32())
        .bind(product_id.as_str())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all of a user's cart lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            DELETE FROM cart_items
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
