//! Profile repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use opaline_core::{Email, UserId};

use super::RepositoryError;
use crate::models::{Profile, ProfileDetails};

/// Raw `profiles` row before validation.
#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: i32,
    first_name: String,
    last_name: String,
    email: String,
    address: Option<String>,
    contact_no: Option<String>,
    updated_at: DateTime<Utc>,
}

impl ProfileRow {
    fn into_profile(self) -> Result<Profile, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Profile {
            user_id: UserId::new(self.user_id),
            first_name: self.first_name,
            last_name: self.last_name,
            email,
            address: self.address,
            contact_no: self.contact_no,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for buyer profiles.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's profile, if present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT user_id, first_name, last_name, email, address, contact_no, updated_at
            FROM profiles
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(ProfileRow::into_profile).transpose()
    }

    /// Insert or refresh a user's profile, keyed by user id.
    ///
    /// Idempotent: checkout and registration both call this without caring
    /// whether a row already exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        user_id: UserId,
        details: &ProfileDetails,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO profiles (user_id, first_name, last_name, email, address, contact_no)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                address = EXCLUDED.address,
                contact_no = EXCLUDED.contact_no,
                updated_at = NOW()
            ",
        )
        .bind(user_id.as_i32())
        .bind(&details.first_name)
        .bind(&details.last_name)
        .bind(details.email.as_str())
        .bind(details.address.as_deref())
        .bind(details.contact_no.as_deref())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Update only the shipping address and contact number.
    ///
    /// Used by authenticated checkout, which keeps the buyer's name as-is.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_contact(
        &self,
        user_id: UserId,
        address: &str,
        contact_no: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE profiles
            SET address = $2, contact_no = $3, updated_at = NOW()
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .bind(address)
        .bind(contact_no)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
