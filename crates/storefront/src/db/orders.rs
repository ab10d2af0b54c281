//! Order repository.
//!
//! An order row and its item snapshots are written in a single transaction:
//! the order id is the foreign key the items require, and a half-written
//! order is worse than no order.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use opaline_core::{OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::RepositoryError;
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem};

/// Raw `orders` row before validation.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    status: String,
    payment_method: String,
    total_amount: Decimal,
    shipping_address: String,
    contact_no: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, RepositoryError> {
        let status = OrderStatus::from_str(&self.status)
            .map_err(RepositoryError::DataCorruption)?;
        let payment_method = PaymentMethod::from_str(&self.payment_method)
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            status,
            payment_method,
            total_amount: self.total_amount,
            shipping_address: self.shipping_address,
            contact_no: self.contact_no,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

/// Raw `order_items` row.
#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: String,
    product_name: String,
    product_image: Option<String>,
    unit_price: Decimal,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(r.id),
            order_id: OrderId::new(r.order_id),
            product_id: ProductId::from(r.product_id),
            product_name: r.product_name,
            product_image: r.product_image,
            unit_price: r.unit_price,
            quantity: u32::try_from(r.quantity).unwrap_or(1),
        }
    }
}

/// Repository for orders and their item snapshots.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and its item snapshots in one transaction.
    ///
    /// The order row is written first (status `pending`), then every item
    /// referencing it; either all rows land or none do.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails; nothing is
    /// persisted in that case.
    pub async fn create_with_items(
        &self,
        new_order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO orders (user_id, status, payment_method, total_amount,
                                shipping_address, contact_no, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, status, payment_method, total_amount,
                      shipping_address, contact_no, notes, created_at
            ",
        )
        .bind(new_order.user_id.as_i32())
        .bind(OrderStatus::Pending.to_string())
        .bind(new_order.payment_method.to_string())
        .bind(new_order.total_amount)
        .bind(&new_order.shipping_address)
        .bind(&new_order.contact_no)
        .bind(new_order.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let order = row.into_order()?;

        for item in items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, product_name,
                                         product_image, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(order.id.as_i32())
            .bind(item.product_id.as_str())
            .bind(&item.product_name)
            .bind(item.product_image.as_deref())
            .bind(item.unit_price)
            .bind(i32::try_from(item.quantity).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(order)
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored status is invalid.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, status, payment_method, total_amount,
                   shipping_address, contact_no, notes, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    /// List the item snapshots for an order, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, product_name, product_image,
                   unit_price, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(order_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }
}
