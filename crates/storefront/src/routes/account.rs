//! Account route handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::db::orders::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderItem};
use crate::state::AppState;

/// An order with its item snapshots, as shown in order history.
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Order history for the signed-in user, newest first.
#[instrument(skip(state, user))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderWithItems>>> {
    let repo = OrderRepository::new(state.pool());

    let orders = repo.list_for_user(user.id).await?;
    let mut history = Vec::with_capacity(orders.len());
    for order in orders {
        let items = repo.list_items(order.id).await?;
        history.push(OrderWithItems { order, items });
    }

    Ok(Json(history))
}
