//! Cart route handlers.
//!
//! Every handler dispatches on the session owner: a signed-in user works
//! against the persisted cart, a guest against the session-stored line list.
//! Responses carry the full cart view with totals derived on read, so the UI
//! can re-render without a second fetch. A failed mutation returns an error
//! body and leaves the stored cart untouched.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use opaline_core::ProductId;

use crate::cart::store::SessionCartStore;
use crate::cart::{CartOwner, CartView, GuestCart, UserCart};
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::ProductSnapshot;
use crate::state::AppState;

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: Option<u32>,
}

/// Update quantity request body.
///
/// Quantity is signed on the wire; zero and below remove the line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Remove from cart request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: String,
}

/// The cart handle for this request's owner.
enum Cart<'a> {
    Guest(GuestCart<SessionCartStore>),
    User(UserCart<'a>),
}

fn cart_for(state: &AppState, session: Session, owner: CartOwner) -> Cart<'_> {
    match owner {
        CartOwner::Authenticated(user_id) => Cart::User(UserCart::new(state.pool(), user_id)),
        CartOwner::Anonymous => Cart::Guest(GuestCart::new(SessionCartStore::new(session))),
    }
}

/// Display the current cart.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let view = match cart_for(&state, session, CartOwner::from_session(user.as_ref())) {
        Cart::Guest(cart) => cart.view().await?,
        Cart::User(cart) => cart.view().await?,
    };
    Ok(Json(view))
}

/// Add a product to the cart.
///
/// Adding a product that is already present increments the existing line
/// instead of duplicating it.
#[instrument(skip(state, session, user, request))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    let product = ProductSnapshot {
        id: ProductId::from(request.product_id),
        name: request.product_name,
        image: request.product_image,
        price: request.unit_price,
    };
    let quantity = request.quantity.unwrap_or(1);

    let view = match cart_for(&state, session, CartOwner::from_session(user.as_ref())) {
        Cart::Guest(cart) => cart.add(&product, quantity).await?,
        Cart::User(cart) => cart.add(&product, quantity).await?,
    };
    Ok(Json(view))
}

/// Overwrite a line's quantity; zero or negative removes the line.
#[instrument(skip(state, session, user, request))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let product_id = ProductId::from(request.product_id);
    let quantity = u32::try_from(request.quantity.max(0)).unwrap_or(u32::MAX);

    let view = match cart_for(&state, session, CartOwner::from_session(user.as_ref())) {
        Cart::Guest(cart) => cart.set_quantity(&product_id, quantity).await?,
        Cart::User(cart) => cart.set_quantity(&product_id, quantity).await?,
    };
    Ok(Json(view))
}

/// Remove a line; absent lines are a no-op, not an error.
#[instrument(skip(state, session, user, request))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    let product_id = ProductId::from(request.product_id);

    let view = match cart_for(&state, session, CartOwner::from_session(user.as_ref())) {
        Cart::Guest(cart) => cart.remove(&product_id).await?,
        Cart::User(cart) => cart.remove(&product_id).await?,
    };
    Ok(Json(view))
}

/// Delete every line. Called by the UI once, right after order placement.
#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let view = match cart_for(&state, session, CartOwner::from_session(user.as_ref())) {
        Cart::Guest(cart) => cart.clear().await?,
        Cart::User(cart) => cart.clear().await?,
    };
    Ok(Json(view))
}
