//! Authentication route handlers.
//!
//! Signing in (or registering, which signs in) is the one place cart
//! ownership transitions: the session's guest lines drain into the user's
//! persisted cart before the response returns. Signing out does not merge
//! anything back.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use opaline_core::{Email, UserId};

use crate::cart::merge_guest_cart;
use crate::cart::store::SessionCartStore;
use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub contact_no: Option<String>,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Change password request body.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Session user as returned to the client.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: Email,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Sign the user into the session and run the guest-cart merge.
///
/// A merge failure is logged but does not fail the sign-in: the guest store
/// is left uncleared, so the next sign-in retries the merge.
async fn establish_session(state: &AppState, session: &Session, user: &User) -> Result<()> {
    let current_user = CurrentUser {
        id: user.id,
        email: user.email.clone(),
    };
    set_current_user(session, &current_user).await?;

    let store = SessionCartStore::new(session.clone());
    if let Err(e) = merge_guest_cart(&store, state.pool(), user.id).await {
        tracing::error!(user_id = %user.id, error = %e, "Failed to merge guest cart on sign-in");
    }

    Ok(())
}

/// Create an account and sign it in.
#[instrument(skip(state, session, request))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let registration = Registration {
        first_name: request.first_name,
        last_name: request.last_name,
        address: request.address,
        contact_no: request.contact_no,
    };

    let user = AuthService::new(state.pool())
        .register(&request.email, &request.password, registration)
        .await?;

    establish_session(&state, &session, &user).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Sign in with email and password.
#[instrument(skip(state, session, request))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<UserResponse>> {
    let user = AuthService::new(state.pool())
        .login_with_password(&request.email, &request.password)
        .await?;

    establish_session(&state, &session, &user).await?;

    Ok(Json(UserResponse::from(&user)))
}

/// Sign out. The server cart stays put; the session reverts to an empty
/// guest cart.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The current session user, or `null` for guests.
#[instrument(skip(user))]
pub async fn me(OptionalAuth(user): OptionalAuth) -> Json<Option<UserResponse>> {
    Json(user.map(|u| UserResponse {
        id: u.id,
        email: u.email,
    }))
}

/// Change the signed-in user's password.
#[instrument(skip(state, user, request))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool())
        .change_password(user.id, &request.current_password, &request.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
