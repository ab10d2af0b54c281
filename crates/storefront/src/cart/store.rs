//! Guest cart storage capability.
//!
//! The anonymous cart is a JSON line list under a fixed key. Dispatching
//! through this trait keeps the guest path testable without a real session
//! layer; production uses [`SessionCartStore`], unit tests use
//! [`InMemoryCartStore`].

use thiserror::Error;
use tower_sessions::Session;

use crate::models::{CartLine, session_keys};

/// Errors from the guest cart's backing storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Session layer failed to read or write.
    #[error("session storage error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Load/save/clear capability for the anonymous cart.
pub trait GuestCartStore {
    /// Load the stored lines; an absent entry is an empty cart.
    fn load(&self) -> impl Future<Output = Result<Vec<CartLine>, StoreError>> + Send;

    /// Replace the stored lines.
    fn save(&self, lines: &[CartLine]) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the stored entry entirely.
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Guest cart persisted in the tower-sessions session.
#[derive(Clone)]
pub struct SessionCartStore {
    session: Session,
}

impl SessionCartStore {
    /// Wrap the request's session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl GuestCartStore for SessionCartStore {
    async fn load(&self) -> Result<Vec<CartLine>, StoreError> {
        let lines = self
            .session
            .get::<Vec<CartLine>>(session_keys::GUEST_CART)
            .await?
            .unwrap_or_default();
        Ok(lines)
    }

    async fn save(&self, lines: &[CartLine]) -> Result<(), StoreError> {
        self.session.insert(session_keys::GUEST_CART, lines).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.session
            .remove::<Vec<CartLine>>(session_keys::GUEST_CART)
            .await?;
        Ok(())
    }
}

/// In-memory guest cart store for unit tests.
#[derive(Default)]
pub struct InMemoryCartStore {
    lines: std::sync::Mutex<Vec<CartLine>>,
}

impl InMemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with lines.
    #[must_use]
    pub fn with_lines(lines: Vec<CartLine>) -> Self {
        Self {
            lines: std::sync::Mutex::new(lines),
        }
    }
}

impl GuestCartStore for InMemoryCartStore {
    async fn load(&self) -> Result<Vec<CartLine>, StoreError> {
        Ok(self.lines.lock().map(|l| l.clone()).unwrap_or_default())
    }

    async fn save(&self, lines: &[CartLine]) -> Result<(), StoreError> {
        if let Ok(mut stored) = self.lines.lock() {
            *stored = lines.to_vec();
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        if let Ok(mut stored) = self.lines.lock() {
            stored.clear();
        }
        Ok(())
    }
}
