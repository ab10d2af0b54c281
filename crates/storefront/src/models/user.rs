//! User account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opaline_core::{Email, UserId};

/// A storefront user account.
///
/// The password hash lives in its own table and never appears on this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
