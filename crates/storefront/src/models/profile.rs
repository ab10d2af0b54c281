//! Buyer profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opaline_core::{Email, UserId};

/// Contact and shipping details for a user, one row per account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub address: Option<String>,
    pub contact_no: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Buyer's display name ("First Last", trimmed).
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}

/// Profile fields written by registration and checkout.
///
/// Upserts are keyed by user id, so repeating a checkout for the same account
/// simply refreshes these fields.
#[derive(Debug, Clone)]
pub struct ProfileDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub address: Option<String>,
    pub contact_no: Option<String>,
}
