//! Integration tests for cart operations and the guest-to-user merge.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (cargo run -p opaline-cli -- migrate storefront)
//! - The storefront running (cargo run -p opaline-storefront)
//!
//! Run with: cargo test -p opaline-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use opaline_integration_tests::{session_client, storefront_base_url, unique_email};

/// Test helper: add a product to the session's cart.
async fn add_to_cart(client: &Client, product_id: &str, unit_price: i64, quantity: u32) -> Value {
    let base_url = storefront_base_url();
    let resp = client
        .post(format!("{base_url}/cart/add"))
        .json(&json!({
            "product_id": product_id,
            "product_name": format!("Product {product_id}"),
            "product_image": null,
            "unit_price": unit_price.to_string(),
            "quantity": quantity,
        }))
        .send()
        .await
        .expect("Failed to add to cart");

    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Failed to parse cart view")
}

/// Test helper: fetch the session's cart view.
async fn get_cart(client: &Client) -> Value {
    let base_url = storefront_base_url();
    let resp = client
        .get(format!("{base_url}/cart"))
        .send()
        .await
        .expect("Failed to get cart");

    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Failed to parse cart view")
}

/// Test helper: register an account (signs the session in).
async fn register(client: &Client, email: &str, password: &str) {
    let base_url = storefront_base_url();
    let resp = client
        .post(format!("{base_url}/auth/register"))
        .json(&json!({
            "email": email,
            "password": password,
            "first_name": "Test",
            "last_name": "Buyer",
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED);
}

/// Test helper: log in (triggers the guest-cart merge).
async fn login(client: &Client, email: &str, password: &str) {
    let base_url = storefront_base_url();
    let resp = client
        .post(format!("{base_url}/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to login");

    assert_eq!(resp.status(), StatusCode::OK);
}

/// Test helper: log the session out.
async fn logout(client: &Client) {
    let base_url = storefront_base_url();
    let resp = client
        .post(format!("{base_url}/auth/logout"))
        .send()
        .await
        .expect("Failed to logout");

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

fn items(view: &Value) -> &Vec<Value> {
    view["items"].as_array().expect("items array")
}

// ============================================================================
// Cart Operation Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_adding_same_product_twice_keeps_single_line() {
    let client = session_client();

    add_to_cart(&client, "P1", 500, 2).await;
    let view = add_to_cart(&client, "P1", 500, 3).await;

    assert_eq!(items(&view).len(), 1);
    assert_eq!(view["items"][0]["quantity"], 5);
    assert_eq!(view["total_items"], 5);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_remove_of_absent_product_is_noop() {
    let client = session_client();
    let base_url = storefront_base_url();

    add_to_cart(&client, "P1", 500, 1).await;

    let resp = client
        .post(format!("{base_url}/cart/remove"))
        .json(&json!({ "product_id": "not-in-cart" }))
        .send()
        .await
        .expect("Failed to remove");

    assert_eq!(resp.status(), StatusCode::OK);
    let view: Value = resp.json().await.expect("cart view");
    assert_eq!(items(&view).len(), 1);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_update_quantity_to_zero_removes_line() {
    let client = session_client();
    let base_url = storefront_base_url();

    add_to_cart(&client, "P1", 500, 4).await;

    let resp = client
        .post(format!("{base_url}/cart/update"))
        .json(&json!({ "product_id": "P1", "quantity": 0 }))
        .send()
        .await
        .expect("Failed to update");

    let view: Value = resp.json().await.expect("cart view");
    assert!(items(&view).is_empty());
    assert_eq!(view["total_items"], 0);
}

// ============================================================================
// Merge Transition Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_guest_cart_merges_into_fresh_account() {
    let client = session_client();
    let email = unique_email("merge-fresh");

    // Anonymous cart: (P1, 2) at 500 each
    add_to_cart(&client, "P1", 500, 2).await;

    // Registration signs the session in and fires the merge
    register(&client, &email, "sturdy passphrase 9").await;

    let view = get_cart(&client).await;
    assert_eq!(items(&view).len(), 1);
    assert_eq!(view["items"][0]["product_id"], "P1");
    assert_eq!(view["items"][0]["quantity"], 2);

    // The guest store was cleared: signing out reveals an empty guest cart
    logout(&client).await;
    let guest_view = get_cart(&client).await;
    assert!(items(&guest_view).is_empty());
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_merge_sums_quantities_with_existing_server_line() {
    let email = unique_email("merge-sum");
    let password = "sturdy passphrase 9";

    // Session one: create the account and put (P1, 5) in the server cart
    let first_session = session_client();
    register(&first_session, &email, password).await;
    add_to_cart(&first_session, "P1", 500, 5).await;

    // Session two: guest adds (P1, 2), then signs in
    let second_session = session_client();
    add_to_cart(&second_session, "P1", 500, 2).await;
    login(&second_session, &email, password).await;

    let view = get_cart(&second_session).await;
    assert_eq!(items(&view).len(), 1);
    assert_eq!(view["items"][0]["quantity"], 7);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_logout_does_not_carry_server_cart_back_to_guest() {
    let client = session_client();
    let email = unique_email("logout");

    register(&client, &email, "sturdy passphrase 9").await;
    add_to_cart(&client, "P1", 500, 3).await;

    logout(&client).await;

    // The server cart stays put but the guest view is empty
    let view = get_cart(&client).await;
    assert!(items(&view).is_empty());
}
