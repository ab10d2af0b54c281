//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (verifies database)
//!
//! # Cart (works for both guests and signed-in users)
//! GET  /cart                   - Current cart view with derived totals
//! POST /cart/add               - Add a product (merges into an existing line)
//! POST /cart/update            - Overwrite a line's quantity (<= 0 removes)
//! POST /cart/remove            - Remove a line (no-op when absent)
//! POST /cart/clear             - Delete every line
//!
//! # Auth
//! POST /auth/register          - Create account, sign in, merge guest cart
//! POST /auth/login             - Sign in, merge guest cart
//! POST /auth/logout            - Sign out (no merge back)
//! GET  /auth/me                - Current session user, if any
//! POST /auth/password          - Change password (requires auth)
//!
//! # Checkout
//! POST /checkout/guest         - Guest checkout with account provisioning
//! POST /checkout               - Place order from persisted cart (requires auth)
//!
//! # Account (requires auth)
//! GET  /account/orders         - Order history with item snapshots
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password", post(auth::change_password))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::place_order))
        .route("/guest", post(checkout::guest))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new().route("/orders", get(account::orders))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .nest("/auth", auth_routes())
        .nest("/checkout", checkout_routes())
        .nest("/account", account_routes())
}
