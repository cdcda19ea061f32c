//! The admin gate and catalog management.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use fernleaf_integration_tests::{TestEnv, cents, price};

#[tokio::test]
async fn test_non_admin_sign_in_is_refused() {
    let env = TestEnv::start().await;
    let client = TestEnv::client();
    env.sign_up(&client, "shopper@example.com").await;

    let response = env.admin_sign_in(&client, "shopper@example.com").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // No admin session was left behind
    let response = client
        .get(env.admin("/admin/api/products"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_anonymous_requests_are_unauthorized() {
    let env = TestEnv::start().await;

    let response = TestEnv::client()
        .get(env.admin("/admin/api/dashboard"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revoked_admin_loses_access_mid_session() {
    let env = TestEnv::start().await;
    let admin = env.admin_client("owner@example.com").await;

    let response = admin
        .get(env.admin("/admin/api/dashboard"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session: Value = admin
        .get(env.store("/api/auth/session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let user_id = serde_json::from_value(session["user"]["id"].clone()).unwrap();
    env.backend.set_admin(user_id, false);

    let response = admin
        .get(env.admin("/admin/api/dashboard"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Admin access required");
}

#[tokio::test]
async fn test_product_lifecycle() {
    let env = TestEnv::start().await;
    let admin = env.admin_client("owner@example.com").await;
    let shopper = TestEnv::client();

    let response = admin
        .post(env.admin("/admin/api/products"))
        .json(&json!({
            "name": "Hanging Planter",
            "price": "24.50",
            "stock_count": 3,
            "tags": ["outdoor"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let product: Value = response.json().await.unwrap();
    assert_eq!(product["slug"], "hanging-planter");
    assert_eq!(price(&product["price"]), cents(2450));
    let id = product["id"].as_str().unwrap().to_string();

    // Visible on the storefront
    let response = shopper
        .get(env.store("/api/products/hanging-planter"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = admin
        .patch(env.admin(&format!("/admin/api/products/{id}")))
        .json(&json!({ "price": "19.99" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let product: Value = response.json().await.unwrap();
    assert_eq!(price(&product["price"]), cents(1999));

    // Hidden once deactivated, still listed for admins
    let response = admin
        .post(env.admin(&format!("/admin/api/products/{id}/toggle-active")))
        .send()
        .await
        .unwrap();
    let product: Value = response.json().await.unwrap();
    assert_eq!(product["is_active"], false);

    let response = shopper
        .get(env.store("/api/products/hanging-planter"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let page: Value = admin
        .get(env.admin("/admin/api/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["products"].as_array().unwrap().len(), 1);

    let response = admin
        .delete(env.admin(&format!("/admin/api/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = admin
        .get(env.admin(&format!("/admin/api/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_negative_price_is_rejected() {
    let env = TestEnv::start().await;
    let admin = env.admin_client("owner@example.com").await;

    let response = admin
        .post(env.admin("/admin/api/products"))
        .json(&json!({ "name": "Broken", "price": "-1.00" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_status_update() {
    let env = TestEnv::start().await;
    let admin = env.admin_client("owner@example.com").await;
    let buyer = TestEnv::client();
    let a = env.seed_product("Terrarium", 5000);
    env.sign_up(&buyer, "buyer@example.com").await;
    env.add_to_cart(&buyer, a.id, 1).await;

    let order: Value = buyer
        .post(env.store("/api/checkout"))
        .json(&json!({
            "shipping_address": {
                "full_name": "Ada Fern",
                "line1": "1 Greenhouse Row",
                "city": "Portland",
                "postal_code": "97201",
                "country": "US"
            }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = order["id"].as_str().unwrap();

    let response = admin
        .patch(env.admin(&format!("/admin/api/orders/{id}")))
        .json(&json!({ "status": "processing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "processing");

    let summary: Value = admin
        .get(env.admin("/admin/api/dashboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["orders"]["processing"], 1);
    assert_eq!(price(&summary["revenue"]), price(&order["total_amount"]));
}
