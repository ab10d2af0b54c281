//! Integration tests for Opaline.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the storefront
//! cargo run -p opaline-cli -- migrate storefront
//! cargo run -p opaline-storefront
//!
//! # Run the ignored end-to-end tests against it
//! cargo test -p opaline-integration-tests -- --ignored
//! ```
//!
//! Tests drive the HTTP API with a cookie-holding client, so guest carts and
//! sessions behave exactly as a browser's would.

use reqwest::Client;
use uuid::Uuid;

/// Base URL for the storefront API (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client with its own cookie jar - one per simulated browser session.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique email per test run, so reruns never collide on accounts.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@integration.test", Uuid::new_v4().simple())
}
