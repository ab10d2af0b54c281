//! Cart reconciliation service.
//!
//! A cart's lines belong to exactly one owner at a time: the anonymous
//! session (JSON lines behind a [`GuestCartStore`]) or a signed-in user
//! (`cart_items` rows). Every operation exists for both owners with the same
//! semantics; [`merge_guest_cart`] is the one place the two populations meet,
//! when a guest signs in.
//!
//! Totals are derived on every read and never stored.

pub mod store;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use opaline_core::{ProductId, UserId};

use crate::db::RepositoryError;
use crate::db::cart::CartRepository;
use crate::models::{CartLine, CurrentUser, ProductSnapshot};
use store::{GuestCartStore, StoreError};

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOwner {
    /// No session user; lines live in browser-session storage only.
    Anonymous,
    /// Signed-in user; lines live in the `cart_items` table.
    Authenticated(UserId),
}

impl CartOwner {
    /// Derive the owner from the session's optional user.
    #[must_use]
    pub fn from_session(user: Option<&CurrentUser>) -> Self {
        user.map_or(Self::Anonymous, |u| Self::Authenticated(u.id))
    }
}

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Rejected input (zero quantity, blank product fields).
    #[error("invalid cart input: {0}")]
    Invalid(String),

    /// Database failure on the authenticated path.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Guest storage failure.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// A cart read model: the lines plus totals derived from them.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_items: u32,
    pub total_price: Decimal,
}

impl CartView {
    /// Build a view from lines, computing both totals.
    #[must_use]
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let total_items = items.iter().map(|l| l.quantity).sum();
        let total_price = items.iter().map(CartLine::line_total).sum();
        Self {
            items,
            total_items,
            total_price,
        }
    }
}

/// Check the add-to-cart contract: quantity >= 1, product fields present.
fn validate_add(product: &ProductSnapshot, quantity: u32) -> Result<(), CartError> {
    if quantity == 0 {
        return Err(CartError::Invalid("quantity must be at least 1".to_owned()));
    }
    if product.id.is_empty() {
        return Err(CartError::Invalid("product id is required".to_owned()));
    }
    if product.name.trim().is_empty() {
        return Err(CartError::Invalid("product name is required".to_owned()));
    }
    if product.price.is_sign_negative() {
        return Err(CartError::Invalid("product price must not be negative".to_owned()));
    }
    Ok(())
}

// =============================================================================
// In-memory line operations (guest path and merge share these)
// =============================================================================

/// Add to the line for `product`, or append a new line.
///
/// At most one line per product: an existing line's quantity grows by
/// `quantity` instead of a duplicate appearing.
fn upsert_line(lines: &mut Vec<CartLine>, product: &ProductSnapshot, quantity: u32) {
    if let Some(line) = lines.iter_mut().find(|l| l.product_id == product.id) {
        line.quantity += quantity;
        return;
    }

    lines.push(CartLine {
        id: format!("guest-{}", Uuid::new_v4()),
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        product_image: product.image.clone(),
        unit_price: product.price,
        quantity,
    });
}

/// Drop the line for `product_id`; absent lines are a no-op.
fn remove_line(lines: &mut Vec<CartLine>, product_id: &ProductId) {
    lines.retain(|l| &l.product_id != product_id);
}

/// Overwrite a line's quantity; zero removes the line entirely.
fn set_line_quantity(lines: &mut Vec<CartLine>, product_id: &ProductId, quantity: u32) {
    if quantity == 0 {
        remove_line(lines, product_id);
        return;
    }
    if let Some(line) = lines.iter_mut().find(|l| &l.product_id == product_id) {
        line.quantity = quantity;
    }
}

// =============================================================================
// Guest cart
// =============================================================================

/// Cart operations for the anonymous owner, over a [`GuestCartStore`].
pub struct GuestCart<S> {
    store: S,
}

impl<S: GuestCartStore> GuestCart<S> {
    /// Wrap a guest store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Current view of the guest cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the backing store fails.
    pub async fn view(&self) -> Result<CartView, CartError> {
        Ok(CartView::from_lines(self.store.load().await?))
    }

    /// Add `quantity` of a product, merging into an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Invalid` on a bad product or zero quantity,
    /// `CartError::Storage` if the backing store fails.
    pub async fn add(
        &self,
        product: &ProductSnapshot,
        quantity: u32,
    ) -> Result<CartView, CartError> {
        validate_add(product, quantity)?;

        let mut lines = self.store.load().await?;
        upsert_line(&mut lines, product, quantity);
        self.store.save(&lines).await?;

        Ok(CartView::from_lines(lines))
    }

    /// Remove the line for a product; no-op if absent.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the backing store fails.
    pub async fn remove(&self, product_id: &ProductId) -> Result<CartView, CartError> {
        let mut lines = self.store.load().await?;
        remove_line(&mut lines, product_id);
        self.store.save(&lines).await?;

        Ok(CartView::from_lines(lines))
    }

    /// Overwrite a line's quantity; zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the backing store fails.
    pub async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartView, CartError> {
        let mut lines = self.store.load().await?;
        set_line_quantity(&mut lines, product_id, quantity);
        self.store.save(&lines).await?;

        Ok(CartView::from_lines(lines))
    }

    /// Delete every line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the backing store fails.
    pub async fn clear(&self) -> Result<CartView, CartError> {
        self.store.clear().await?;
        Ok(CartView::from_lines(Vec::new()))
    }
}

// =============================================================================
// Authenticated cart
// =============================================================================

/// Cart operations for a signed-in user, over the `cart_items` table.
pub struct UserCart<'a> {
    repo: CartRepository<'a>,
    user_id: UserId,
}

impl<'a> UserCart<'a> {
    /// Cart handle for one user.
    #[must_use]
    pub const fn new(pool: &'a PgPool, user_id: UserId) -> Self {
        Self {
            repo: CartRepository::new(pool),
            user_id,
        }
    }

    /// Current view of the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn view(&self) -> Result<CartView, CartError> {
        let rows = self.repo.list(self.user_id).await?;
        Ok(CartView::from_lines(
            rows.into_iter().map(CartLine::from).collect(),
        ))
    }

    /// Add `quantity` of a product, merging into an existing line.
    ///
    /// Two devices adding the same new product can race past the existence
    /// check; the loser's insert hits the `(user_id, product_id)` unique
    /// constraint and is retried as an increment against the winner's row.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Invalid` on a bad product or zero quantity,
    /// `CartError::Repository` if persistence fails.
    pub async fn add(
        &self,
        product: &ProductSnapshot,
        quantity: u32,
    ) -> Result<CartView, CartError> {
        validate_add(product, quantity)?;

        let incremented = self
            .repo
            .increment_quantity(self.user_id, &product.id, quantity)
            .await?;

        if !incremented {
            match self.repo.insert(self.user_id, product, quantity).await {
                Ok(_) => {}
                Err(RepositoryError::Conflict(_)) => {
                    // Lost the insert race; the winner's row takes the quantity.
                    self.repo
                        .increment_quantity(self.user_id, &product.id, quantity)
                        .await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.view().await
    }

    /// Remove the line for a product; no-op if absent.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn remove(&self, product_id: &ProductId) -> Result<CartView, CartError> {
        self.repo.delete(self.user_id, product_id).await?;
        self.view().await
    }

    /// Overwrite a line's quantity; zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartView, CartError> {
        if quantity == 0 {
            return self.remove(product_id).await;
        }
        self.repo
            .set_quantity(self.user_id, product_id, quantity)
            .await?;
        self.view().await
    }

    /// Delete every line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn clear(&self) -> Result<CartView, CartError> {
        self.repo.clear(self.user_id).await?;
        Ok(CartView::from_lines(Vec::new()))
    }
}

// =============================================================================
// Ownership transition
// =============================================================================

/// Drain the guest cart into a user's server-side cart.
///
/// Fires once per sign-in. Each guest line lands on the server either by
/// incrementing an existing `(user_id, product_id)` line by the guest
/// quantity or by inserting a fresh line; afterwards the guest store is
/// cleared and the server table is the sole source of truth.
///
/// Lines merge sequentially. A concurrent mutation from another device can
/// interleave; quantities on a contested line resolve last-write-wins.
///
/// # Errors
///
/// Returns `CartError::Storage` if the guest store fails,
/// `CartError::Repository` if persistence fails; the guest store is only
/// cleared after every line merged.
pub async fn merge_guest_cart<S: GuestCartStore>(
    store: &S,
    pool: &PgPool,
    user_id: UserId,
) -> Result<(), CartError> {
    let guest_lines = store.load().await?;
    if guest_lines.is_empty() {
        return Ok(());
    }

    let repo = CartRepository::new(pool);
    for line in &guest_lines {
        let merged = repo
            .increment_quantity(user_id, &line.product_id, line.quantity)
            .await?;
        if merged {
            continue;
        }

        let snapshot = ProductSnapshot {
            id: line.product_id.clone(),
            name: line.product_name.clone(),
            image: line.product_image.clone(),
            price: line.unit_price,
        };
        match repo.insert(user_id, &snapshot, line.quantity).await {
            Ok(_) => {}
            Err(RepositoryError::Conflict(_)) => {
                repo.increment_quantity(user_id, &line.product_id, line.quantity)
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    store.clear().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::store::InMemoryCartStore;
    use super::*;

    fn pendant() -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::from("P1"),
            name: "Opal pendant".to_owned(),
            image: Some("https://cdn.test/p1.jpg".to_owned()),
            price: Decimal::new(50000, 2), // 500.00
        }
    }

    fn ring() -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::from("P2"),
            name: "Moonstone ring".to_owned(),
            image: None,
            price: Decimal::new(129_900, 2), // 1299.00
        }
    }

    #[tokio::test]
    async fn test_add_same_product_twice_sums_quantity() {
        let cart = GuestCart::new(InMemoryCartStore::new());

        cart.add(&pendant(), 2).await.unwrap();
        let view = cart.add(&pendant(), 3).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items.first().unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_add_keeps_price_snapshot_from_first_add() {
        let cart = GuestCart::new(InMemoryCartStore::new());
        cart.add(&pendant(), 1).await.unwrap();

        let repriced = ProductSnapshot {
            price: Decimal::new(99900, 2),
            ..pendant()
        };
        let view = cart.add(&repriced, 1).await.unwrap();

        // The existing line's snapshot wins; no duplicate appears.
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items.first().unwrap().unit_price, Decimal::new(50000, 2));
    }

    #[tokio::test]
    async fn test_add_rejects_zero_quantity() {
        let cart = GuestCart::new(InMemoryCartStore::new());
        let err = cart.add(&pendant(), 0).await.unwrap_err();
        assert!(matches!(err, CartError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_add_rejects_blank_product() {
        let cart = GuestCart::new(InMemoryCartStore::new());

        let no_id = ProductSnapshot {
            id: ProductId::from(""),
            ..pendant()
        };
        assert!(matches!(
            cart.add(&no_id, 1).await.unwrap_err(),
            CartError::Invalid(_)
        ));

        let no_name = ProductSnapshot {
            name: "  ".to_owned(),
            ..pendant()
        };
        assert!(matches!(
            cart.add(&no_name, 1).await.unwrap_err(),
            CartError::Invalid(_)
        ));
    }

    #[tokio::test]
    async fn test_remove_absent_line_is_noop() {
        let cart = GuestCart::new(InMemoryCartStore::new());
        cart.add(&pendant(), 2).await.unwrap();

        let view = cart.remove(&ProductId::from("does-not-exist")).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total_items, 2);
    }

    #[tokio::test]
    async fn test_remove_deletes_line() {
        let cart = GuestCart::new(InMemoryCartStore::new());
        cart.add(&pendant(), 2).await.unwrap();
        cart.add(&ring(), 1).await.unwrap();

        let view = cart.remove(&pendant().id).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items.first().unwrap().product_id, ring().id);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes_line() {
        let cart = GuestCart::new(InMemoryCartStore::new());
        cart.add(&pendant(), 4).await.unwrap();

        let view = cart.set_quantity(&pendant().id, 0).await.unwrap();

        assert!(view.items.is_empty());
        assert_eq!(view.total_items, 0);
    }

    #[tokio::test]
    async fn test_set_quantity_overwrites() {
        let cart = GuestCart::new(InMemoryCartStore::new());
        cart.add(&pendant(), 4).await.unwrap();

        let view = cart.set_quantity(&pendant().id, 2).await.unwrap();

        assert_eq!(view.items.first().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_clear_empties_cart() {
        let cart = GuestCart::new(InMemoryCartStore::new());
        cart.add(&pendant(), 1).await.unwrap();
        cart.add(&ring(), 1).await.unwrap();

        let view = cart.clear().await.unwrap();

        assert!(view.items.is_empty());
        assert_eq!(cart.view().await.unwrap().total_items, 0);
    }

    #[tokio::test]
    async fn test_totals_empty_cart() {
        let cart = GuestCart::new(InMemoryCartStore::new());
        let view = cart.view().await.unwrap();

        assert_eq!(view.total_items, 0);
        assert_eq!(view.total_price, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_totals_multi_line() {
        let cart = GuestCart::new(InMemoryCartStore::new());
        cart.add(&pendant(), 2).await.unwrap(); // 2 x 500.00
        cart.add(&ring(), 1).await.unwrap(); // 1 x 1299.00

        let view = cart.view().await.unwrap();

        assert_eq!(view.total_items, 3);
        assert_eq!(view.total_price, Decimal::new(229_900, 2)); // 2299.00
    }

    #[test]
    fn test_upsert_line_generates_distinct_guest_ids() {
        let mut lines = Vec::new();
        upsert_line(&mut lines, &pendant(), 1);
        upsert_line(&mut lines, &ring(), 1);

        let first = lines.first().unwrap();
        let second = lines.get(1).unwrap();
        assert!(first.id.starts_with("guest-"));
        assert!(second.id.starts_with("guest-"));
        assert_ne!(first.id, second.id);
    }
}
