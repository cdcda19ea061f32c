//! Placing orders from the session cart.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use fernleaf_core::OrderNumber;
use fernleaf_integration_tests::{TestEnv, cents, price};

fn checkout_body() -> Value {
    json!({
        "shipping_address": {
            "full_name": "Ada Fern",
            "line1": "1 Greenhouse Row",
            "city": "Portland",
            "region": "OR",
            "postal_code": "97201",
            "country": "US"
        }
    })
}

#[tokio::test]
async fn test_checkout_prices_order_and_empties_cart() {
    let env = TestEnv::start().await;
    let client = TestEnv::client();
    let a = env.seed_product("Terrarium", 5000);
    env.sign_up(&client, "buyer@example.com").await;
    env.add_to_cart(&client, a.id, 2).await;

    let response = client
        .post(env.store("/api/checkout"))
        .json(&checkout_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.unwrap();

    // 100.00 + 8% tax + 5.00 flat shipping
    assert_eq!(price(&order["subtotal"]), cents(10_000));
    assert_eq!(price(&order["tax_amount"]), cents(800));
    assert_eq!(price(&order["shipping_amount"]), cents(500));
    assert_eq!(price(&order["total_amount"]), cents(11_300));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "pending");

    let number = order["order_number"].as_str().unwrap();
    assert!(number.starts_with("ORD-"));
    assert_eq!(number.len(), "ORD-20260101-000001".len());
    assert!(OrderNumber::parse(number).is_ok());

    let cart = env.cart(&client).await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    // Listed in the buyer's history
    let orders: Value = client
        .get(env.store("/api/account/orders"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submitted_discount_is_ignored() {
    let env = TestEnv::start().await;
    let client = TestEnv::client();
    let a = env.seed_product("Terrarium", 5000);
    env.sign_up(&client, "buyer@example.com").await;
    env.add_to_cart(&client, a.id, 2).await;

    let mut body = checkout_body();
    body["discount"] = json!(100);
    body["discount_amount"] = json!(100);
    let order: Value = client
        .post(env.store("/api/checkout"))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(price(&order["discount_amount"]), cents(0));
    assert_eq!(price(&order["total_amount"]), cents(11_300));
}

#[tokio::test]
async fn test_guest_checkout_requires_sign_in() {
    let env = TestEnv::start().await;
    let client = TestEnv::client();
    let a = env.seed_product("Terrarium", 5000);
    env.add_to_cart(&client, a.id, 1).await;

    let response = client
        .post(env.store("/api/checkout"))
        .json(&checkout_body())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cart = env.cart(&client).await;
    assert_eq!(cart["total_items"], 1);
}

#[tokio::test]
async fn test_empty_cart_checkout_is_rejected() {
    let env = TestEnv::start().await;
    let client = TestEnv::client();
    env.sign_up(&client, "buyer@example.com").await;

    let response = client
        .post(env.store("/api/checkout"))
        .json(&checkout_body())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_detail_hidden_from_other_customers() {
    let env = TestEnv::start().await;
    let buyer = TestEnv::client();
    let other = TestEnv::client();
    let a = env.seed_product("Terrarium", 5000);
    env.sign_up(&buyer, "buyer@example.com").await;
    env.sign_up(&other, "other@example.com").await;
    env.add_to_cart(&buyer, a.id, 1).await;

    let order: Value = buyer
        .post(env.store("/api/checkout"))
        .json(&checkout_body())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = order["id"].as_str().unwrap();

    let response = other
        .get(env.store(&format!("/api/account/orders/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
