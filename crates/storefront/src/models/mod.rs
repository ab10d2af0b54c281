//! Domain models for the storefront.

pub mod cart;
pub mod order;
pub mod profile;
pub mod session;
pub mod user;

pub use cart::{CartLine, ProductSnapshot};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem};
pub use profile::{Profile, ProfileDetails};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
