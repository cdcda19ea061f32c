//! Guest and signed-in carts through the storefront API.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::json;

use fernleaf_integration_tests::{TestEnv, cents, price};

#[tokio::test]
async fn test_guest_cart_totals_stay_in_session() {
    let env = TestEnv::start().await;
    let client = TestEnv::client();
    let a = env.seed_product("Fern Pot", 1000);
    let b = env.seed_product("Moss Jar", 500);

    env.add_to_cart(&client, a.id, 1).await;
    env.add_to_cart(&client, a.id, 1).await;
    let cart = env.add_to_cart(&client, b.id, 1).await;

    assert_eq!(cart["items"].as_array().unwrap().len(), 2);
    assert_eq!(cart["total_items"], 3);
    assert_eq!(price(&cart["total_price"]), cents(2500));

    // Survives a fresh read of the session
    let cart = env.cart(&client).await;
    assert_eq!(price(&cart["total_price"]), cents(2500));

    env.settle().await;
    assert!(env.backend.cart_rows().is_empty());
    assert!(env.backend.cart_item_rows().is_empty());
}

#[tokio::test]
async fn test_zero_quantity_removes_line() {
    let env = TestEnv::start().await;
    let client = TestEnv::client();
    let a = env.seed_product("Fern Pot", 1000);
    env.add_to_cart(&client, a.id, 2).await;

    let response = client
        .patch(env.store(&format!("/api/cart/items/{}", a.id)))
        .json(&json!({ "quantity": 0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cart: serde_json::Value = response.json().await.unwrap();
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(cart["total_items"], 0);
}

#[tokio::test]
async fn test_updating_missing_line_is_not_found() {
    let env = TestEnv::start().await;
    let client = TestEnv::client();
    let a = env.seed_product("Fern Pot", 1000);

    let response = client
        .patch(env.store(&format!("/api/cart/items/{}", a.id)))
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sign_in_merges_guest_lines_with_server_cart() {
    let env = TestEnv::start().await;
    let client = TestEnv::client();
    let a = env.seed_product("Fern Pot", 1000);
    let b = env.seed_product("Moss Jar", 500);

    // Signed in: B lands in the server cart
    env.sign_up(&client, "shopper@example.com").await;
    env.add_to_cart(&client, b.id, 2).await;
    env.settle().await;
    env.sign_out(&client).await;
    assert!(env.cart(&client).await["items"].as_array().unwrap().is_empty());

    // As a guest: A only in the session
    env.add_to_cart(&client, a.id, 1).await;

    let response = env.sign_in(&client, "shopper@example.com").await;
    assert_eq!(response.status(), StatusCode::OK);

    let cart = env.cart(&client).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 2);
    assert_eq!(cart["total_items"], 3);
    assert_eq!(price(&cart["total_price"]), cents(2000));

    env.settle().await;
    let rows = env.backend.cart_item_rows();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r.product_id == a.id && r.quantity == 1));
}

#[tokio::test]
async fn test_inactive_product_cannot_be_added() {
    let env = TestEnv::start().await;
    let admin = env.admin_client("owner@example.com").await;
    let client = TestEnv::client();
    let a = env.seed_product("Fern Pot", 1000);

    let response = admin
        .post(env.admin(&format!("/admin/api/products/{}/toggle-active", a.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(env.store("/api/cart/items"))
        .json(&json!({ "product_id": a.id, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
