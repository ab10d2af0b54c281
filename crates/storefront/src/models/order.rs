//! Order and order item models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use opaline_core::{OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, UserId};

/// A placed order.
///
/// Orders always belong to a user; guest checkout provisions an account
/// before the order row is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub contact_no: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An immutable product snapshot attached to an order.
///
/// Decoupled from the live catalog: price or name changes after purchase do
/// not alter past orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Fields for a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub contact_no: String,
    pub notes: Option<String>,
}

/// A product snapshot to persist as an order item.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl NewOrderItem {
    /// Total for this item (`unit_price × quantity`).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}
