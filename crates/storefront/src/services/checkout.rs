//! Checkout services.
//!
//! Guest checkout converts a cart snapshot plus contact details from an
//! unauthenticated buyer into a durable order, transparently provisioning an
//! account when the email is new. Authenticated checkout places an order from
//! the user's persisted cart.
//!
//! Neither operation is idempotent under retry: two identical calls create
//! two orders, and there is no client-supplied idempotency token. The order
//! total is trusted from the client and not recomputed from catalog prices.

use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use opaline_core::{Email, EmailError, OrderId, PaymentMethod, UserId};

use crate::db::RepositoryError;
use crate::db::cart::CartRepository;
use crate::db::orders::OrderRepository;
use crate::db::profiles::ProfileRepository;
use crate::db::users::UserRepository;
use crate::models::{CurrentUser, NewOrder, NewOrderItem, ProfileDetails};
use crate::services::auth;
use crate::services::email::{Notifier, OrderNotification};

/// Characters for generated temporary passwords. Ambiguous glyphs
/// (I, O, i, l, o, 0, 1) are excluded; buyers retype these from an email.
const TEMP_PASSWORD_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789";

/// Random portion length of a temporary password.
const TEMP_PASSWORD_LEN: usize = 10;

/// Fixed suffix satisfying the symbol/digit classes of the password policy.
const TEMP_PASSWORD_SUFFIX: &str = "!1";

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Required fields absent or blank; nothing was mutated.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// No items to order; nothing was mutated.
    #[error("cart is empty")]
    EmptyCart,

    /// Malformed email address; nothing was mutated.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Account creation failed; no order was created.
    #[error("account provisioning failed: {0}")]
    Provisioning(String),

    /// Order/items insert failed. An account provisioned in the same call is
    /// left in place; the next checkout with that email reuses it.
    #[error("order persistence failed: {0}")]
    OrderPersistence(#[source] RepositoryError),

    /// Lookup failure before or outside the persistence step.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Guest checkout input: contact/shipping fields plus the cart snapshot.
///
/// Everything defaults so that presence is checked by [`validate`] with a
/// field-naming error rather than a deserializer rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GuestCheckoutRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub contact_no: String,
    pub notes: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub total_amount: Option<Decimal>,
    pub items: Vec<NewOrderItem>,
}

/// Authenticated checkout input; items come from the user's persisted cart.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaceOrderRequest {
    pub address: String,
    pub contact_no: String,
    pub notes: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub total_amount: Option<Decimal>,
}

/// Guest checkout result.
///
/// `temp_password` is set only for a newly provisioned account, and this
/// response (plus the confirmation email) is the only place the plaintext
/// ever exists.
#[derive(Debug)]
pub struct CheckoutOutcome {
    pub order_id: OrderId,
    pub is_new_account: bool,
    pub temp_password: Option<String>,
}

/// A validated guest order, fields proven present.
#[derive(Debug)]
struct ValidGuestOrder {
    first_name: String,
    last_name: String,
    email: Email,
    address: String,
    contact_no: String,
    notes: Option<String>,
    payment_method: PaymentMethod,
    total_amount: Decimal,
    items: Vec<NewOrderItem>,
}

/// Check presence of every required field before any mutation.
fn validate(req: GuestCheckoutRequest) -> Result<ValidGuestOrder, CheckoutError> {
    let mut missing = Vec::new();
    if req.first_name.trim().is_empty() {
        missing.push("first_name");
    }
    if req.last_name.trim().is_empty() {
        missing.push("last_name");
    }
    if req.email.trim().is_empty() {
        missing.push("email");
    }
    if req.address.trim().is_empty() {
        missing.push("address");
    }
    if req.contact_no.trim().is_empty() {
        missing.push("contact_no");
    }
    if req.payment_method.is_none() {
        missing.push("payment_method");
    }
    if req.total_amount.is_none() {
        missing.push("total_amount");
    }
    if !missing.is_empty() {
        return Err(CheckoutError::MissingFields(missing));
    }

    if req.items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    // Normalizes to lowercase; account lookup depends on it.
    let email = Email::parse(&req.email)?;

    Ok(ValidGuestOrder {
        first_name: req.first_name.trim().to_owned(),
        last_name: req.last_name.trim().to_owned(),
        email,
        address: req.address.trim().to_owned(),
        contact_no: req.contact_no.trim().to_owned(),
        notes: req.notes.filter(|n| !n.trim().is_empty()),
        payment_method: req.payment_method.unwrap_or(PaymentMethod::PlaceOrder),
        total_amount: req.total_amount.unwrap_or_default(),
        items: req.items,
    })
}

/// Generate a random temporary password.
///
/// Ten characters from the fixed set plus the `!1` suffix.
fn generate_temp_password() -> String {
    let mut rng = rand::rng();
    let mut password = String::with_capacity(TEMP_PASSWORD_LEN + TEMP_PASSWORD_SUFFIX.len());
    for _ in 0..TEMP_PASSWORD_LEN {
        let idx = rng.random_range(0..TEMP_PASSWORD_CHARS.len());
        password.push(char::from(*TEMP_PASSWORD_CHARS.get(idx).unwrap_or(&b'x')));
    }
    password.push_str(TEMP_PASSWORD_SUFFIX);
    password
}

/// Checkout service: guest provisioning and order placement.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    notifier: &'a Notifier,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, notifier: &'a Notifier) -> Self {
        Self { pool, notifier }
    }

    /// Guest checkout: find-or-create the account, persist the order,
    /// notify by email.
    ///
    /// The email sends are best-effort and cannot fail the call. The
    /// returned temporary password, when present, is never persisted in
    /// plaintext and cannot be re-derived later.
    ///
    /// # Errors
    ///
    /// Returns `MissingFields`/`EmptyCart`/`InvalidEmail` before any
    /// mutation, `Provisioning` if account creation fails (no order), and
    /// `OrderPersistence` if the order insert fails (a newly created
    /// account is left in place).
    pub async fn guest_checkout(
        &self,
        request: GuestCheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let order_request = validate(request)?;

        let users = UserRepository::new(self.pool);
        let existing = users.get_by_email(&order_request.email).await?;

        let (user, is_new_account, temp_password) = match existing {
            Some(user) => (user, false, None),
            None => {
                let password = generate_temp_password();
                let password_hash = auth::hash_password(&password)
                    .map_err(|e| CheckoutError::Provisioning(e.to_string()))?;

                // Email pre-confirmed: the credentials only reach this inbox.
                let user = users
                    .create_with_password(&order_request.email, &password_hash, true)
                    .await
                    .map_err(|e| CheckoutError::Provisioning(e.to_string()))?;

                tracing::info!(user_id = %user.id, "Provisioned account for guest checkout");
                (user, true, Some(password))
            }
        };

        self.upsert_profile_best_effort(user.id, &order_request).await;

        let order = self.persist_order(user.id, &order_request).await?;

        self.notifier
            .order_placed(&OrderNotification {
                order_id: order.id,
                customer_name: format!(
                    "{} {}",
                    order_request.first_name, order_request.last_name
                ),
                customer_email: order_request.email,
                shipping_address: order_request.address,
                contact_no: order_request.contact_no,
                payment_method: order_request.payment_method,
                total_amount: order_request.total_amount,
                items: order_request.items,
                is_new_account,
                temp_password: temp_password.clone(),
            })
            .await;

        Ok(CheckoutOutcome {
            order_id: order.id,
            is_new_account,
            temp_password,
        })
    }

    /// Authenticated checkout: place an order from the user's persisted cart.
    ///
    /// The caller clears the cart after a successful placement.
    ///
    /// # Errors
    ///
    /// Returns `MissingFields` on blank form fields, `EmptyCart` if the
    /// user's cart has no lines, `OrderPersistence` if the insert fails.
    pub async fn place_order(
        &self,
        current_user: &CurrentUser,
        request: PlaceOrderRequest,
    ) -> Result<OrderId, CheckoutError> {
        let mut missing = Vec::new();
        if request.address.trim().is_empty() {
            missing.push("address");
        }
        if request.contact_no.trim().is_empty() {
            missing.push("contact_no");
        }
        if request.payment_method.is_none() {
            missing.push("payment_method");
        }
        if request.total_amount.is_none() {
            missing.push("total_amount");
        }
        if !missing.is_empty() {
            return Err(CheckoutError::MissingFields(missing));
        }

        let cart_rows = CartRepository::new(self.pool).list(current_user.id).await?;
        if cart_rows.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let items: Vec<NewOrderItem> = cart_rows
            .into_iter()
            .map(|row| NewOrderItem {
                product_id: row.product_id.into(),
                product_name: row.product_name,
                product_image: row.product_image,
                unit_price: row.unit_price,
                quantity: u32::try_from(row.quantity).unwrap_or(1),
            })
            .collect();

        let address = request.address.trim().to_owned();
        let contact_no = request.contact_no.trim().to_owned();
        let payment_method = request.payment_method.unwrap_or(PaymentMethod::PlaceOrder);
        let total_amount = request.total_amount.unwrap_or_default();

        let new_order = NewOrder {
            user_id: current_user.id,
            payment_method,
            total_amount,
            shipping_address: address.clone(),
            contact_no: contact_no.clone(),
            notes: request.notes.filter(|n| !n.trim().is_empty()),
        };
        let order = OrderRepository::new(self.pool)
            .create_with_items(&new_order, &items)
            .await
            .map_err(CheckoutError::OrderPersistence)?;

        let profiles = ProfileRepository::new(self.pool);
        if let Err(e) = profiles
            .update_contact(current_user.id, &address, &contact_no)
            .await
        {
            tracing::warn!(user_id = %current_user.id, error = %e, "Failed to refresh profile contact details");
        }

        let customer_name = match profiles.get(current_user.id).await {
            Ok(Some(profile)) => profile.full_name(),
            _ => "Customer".to_owned(),
        };

        self.notifier
            .order_placed(&OrderNotification {
                order_id: order.id,
                customer_name,
                customer_email: current_user.email.clone(),
                shipping_address: address,
                contact_no,
                payment_method,
                total_amount,
                items,
                is_new_account: false,
                temp_password: None,
            })
            .await;

        Ok(order.id)
    }

    /// Profile refresh is idempotent and non-critical; a failure here must
    /// not abort a checkout whose order can still be placed.
    async fn upsert_profile_best_effort(&self, user_id: UserId, order: &ValidGuestOrder) {
        let details = ProfileDetails {
            first_name: order.first_name.clone(),
            last_name: order.last_name.clone(),
            email: order.email.clone(),
            address: Some(order.address.clone()),
            contact_no: Some(order.contact_no.clone()),
        };

        if let Err(e) = ProfileRepository::new(self.pool).upsert(user_id, &details).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to upsert guest checkout profile");
        }
    }

    /// Insert the order row and its item snapshots.
    async fn persist_order(
        &self,
        user_id: UserId,
        order: &ValidGuestOrder,
    ) -> Result<crate::models::Order, CheckoutError> {
        let new_order = NewOrder {
            user_id,
            payment_method: order.payment_method,
            total_amount: order.total_amount,
            shipping_address: order.address.clone(),
            contact_no: order.contact_no.clone(),
            notes: order.notes.clone(),
        };

        OrderRepository::new(self.pool)
            .create_with_items(&new_order, &order.items)
            .await
            .map_err(CheckoutError::OrderPersistence)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use opaline_core::ProductId;

    fn valid_request() -> GuestCheckoutRequest {
        GuestCheckoutRequest {
            first_name: "Asha".to_owned(),
            last_name: "Rao".to_owned(),
            email: "Asha@Example.com".to_owned(),
            address: "12 Lake View Road, Pune".to_owned(),
            contact_no: "9876543210".to_owned(),
            notes: None,
            payment_method: Some(PaymentMethod::Upi),
            total_amount: Some(Decimal::new(99900, 2)),
            items: vec![NewOrderItem {
                product_id: ProductId::from("P1"),
                product_name: "Opal pendant".to_owned(),
                product_image: None,
                unit_price: Decimal::new(99900, 2),
                quantity: 1,
            }],
        }
    }

    #[test]
    fn test_validate_accepts_complete_request() {
        let valid = validate(valid_request()).unwrap();
        assert_eq!(valid.email.as_str(), "asha@example.com");
        assert_eq!(valid.payment_method, PaymentMethod::Upi);
    }

    #[test]
    fn test_validate_names_every_missing_field() {
        let request = GuestCheckoutRequest {
            items: valid_request().items,
            ..GuestCheckoutRequest::default()
        };

        let err = validate(request).unwrap_err();
        let CheckoutError::MissingFields(fields) = err else {
            panic!("expected MissingFields, got {err:?}");
        };
        assert_eq!(
            fields,
            vec![
                "first_name",
                "last_name",
                "email",
                "address",
                "contact_no",
                "payment_method",
                "total_amount"
            ]
        );
    }

    #[test]
    fn test_validate_blank_strings_count_as_missing() {
        let request = GuestCheckoutRequest {
            contact_no: "   ".to_owned(),
            ..valid_request()
        };

        let err = validate(request).unwrap_err();
        assert!(matches!(err, CheckoutError::MissingFields(f) if f == vec!["contact_no"]));
    }

    #[test]
    fn test_validate_rejects_empty_cart() {
        let request = GuestCheckoutRequest {
            items: Vec::new(),
            ..valid_request()
        };

        assert!(matches!(
            validate(request).unwrap_err(),
            CheckoutError::EmptyCart
        ));
    }

    #[test]
    fn test_validate_rejects_malformed_email() {
        let request = GuestCheckoutRequest {
            email: "not-an-email".to_owned(),
            ..valid_request()
        };

        assert!(matches!(
            validate(request).unwrap_err(),
            CheckoutError::InvalidEmail(_)
        ));
    }

    #[test]
    fn test_validate_drops_blank_notes() {
        let request = GuestCheckoutRequest {
            notes: Some("  ".to_owned()),
            ..valid_request()
        };
        assert!(validate(request).unwrap().notes.is_none());

        let request = GuestCheckoutRequest {
            notes: Some("gift wrap please".to_owned()),
            ..valid_request()
        };
        assert_eq!(
            validate(request).unwrap().notes.as_deref(),
            Some("gift wrap please")
        );
    }

    #[test]
    fn test_temp_password_shape() {
        let password = generate_temp_password();
        assert_eq!(password.len(), TEMP_PASSWORD_LEN + TEMP_PASSWORD_SUFFIX.len());
        assert!(password.ends_with(TEMP_PASSWORD_SUFFIX));

        let random_part = password
            .get(..TEMP_PASSWORD_LEN)
            .expect("password long enough");
        assert!(
            random_part
                .bytes()
                .all(|b| TEMP_PASSWORD_CHARS.contains(&b))
        );
    }

    #[test]
    fn test_temp_passwords_are_random() {
        let a = generate_temp_password();
        let b = generate_temp_password();
        assert_ne!(a, b);
    }

    #[test]
    fn test_temp_password_charset_excludes_ambiguous_glyphs() {
        for forbidden in [b'I', b'O', b'i', b'l', b'o', b'0', b'1'] {
            assert!(!TEMP_PASSWORD_CHARS.contains(&forbidden));
        }
    }
}
