//! Checkout route handlers.
//!
//! Guest checkout is callable without a session; it provisions an account
//! when the email is new and returns one-time credentials exactly once. The
//! UI clears its cart after a successful response.
//!
//! Neither endpoint is idempotent: a double-submit places two orders.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use opaline_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::checkout::{CheckoutService, GuestCheckoutRequest, PlaceOrderRequest};
use crate::state::AppState;

/// Guest checkout response.
///
/// `temp_password` appears only when an account was provisioned; this
/// response and the confirmation email are the only places the plaintext
/// ever exists.
#[derive(Debug, Serialize)]
pub struct GuestCheckoutResponse {
    pub order_id: OrderId,
    pub is_new_account: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_password: Option<String>,
}

/// Authenticated checkout response.
#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub order_id: OrderId,
}

/// Guest checkout: find-or-create the account, persist the order, send
/// best-effort emails.
#[instrument(skip(state, request))]
pub async fn guest(
    State(state): State<AppState>,
    Json(request): Json<GuestCheckoutRequest>,
) -> Result<Json<GuestCheckoutResponse>> {
    let outcome = CheckoutService::new(state.pool(), state.notifier())
        .guest_checkout(request)
        .await?;

    Ok(Json(GuestCheckoutResponse {
        order_id: outcome.order_id,
        is_new_account: outcome.is_new_account,
        temp_password: outcome.temp_password,
    }))
}

/// Place an order from the signed-in user's persisted cart.
#[instrument(skip(state, user, request))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<Json<PlaceOrderResponse>> {
    let order_id = CheckoutService::new(state.pool(), state.notifier())
        .place_order(&user, request)
        .await?;

    Ok(Json(PlaceOrderResponse { order_id }))
}
