//! Engagement counters and the admin report.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::Value;

use fernleaf_integration_tests::TestEnv;

#[tokio::test]
async fn test_views_are_counted_and_reported() {
    let env = TestEnv::start().await;
    let shopper = TestEnv::client();
    let product = env.seed_product("Fern Pot", 1000);

    for _ in 0..3 {
        let response = shopper
            .get(env.store(&format!("/api/products/{}", product.slug)))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    env.add_to_cart(&shopper, product.id, 1).await;
    env.settle().await;

    let rows = env.backend.analytics_rows();
    assert_eq!(rows.iter().map(|r| r.views).sum::<i64>(), 3);
    assert_eq!(rows.iter().map(|r| r.cart_adds).sum::<i64>(), 1);

    let admin = env.admin_client("owner@example.com").await;
    let report: Value = admin
        .get(env.admin("/admin/api/analytics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(report["totals"]["views"], 3);
    assert_eq!(report["totals"]["cart_adds"], 1);
    assert_eq!(report["top"][0]["product_id"], product.id.to_string());
    assert_eq!(report["daily"].as_array().unwrap().len(), 30);
}

#[tokio::test]
async fn test_like_toggle_counts_only_when_set() {
    let env = TestEnv::start().await;
    let shopper = TestEnv::client();
    let product = env.seed_product("Fern Pot", 1000);
    env.sign_up(&shopper, "fan@example.com").await;
    let url = env.store(&format!("/api/products/{}/interactions/like", product.id));

    let first: Value = shopper.post(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(first["active"], true);
    assert_eq!(first["flags"]["liked"], true);

    let second: Value = shopper.post(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(second["active"], false);

    env.settle().await;
    let likes: i64 = env.backend.analytics_rows().iter().map(|r| r.likes).sum();
    assert_eq!(likes, 1);
}

#[tokio::test]
async fn test_unknown_interaction_kind_is_rejected() {
    let env = TestEnv::start().await;
    let shopper = TestEnv::client();
    let product = env.seed_product("Fern Pot", 1000);
    env.sign_up(&shopper, "fan@example.com").await;

    let response = shopper
        .post(env.store(&format!("/api/products/{}/interactions/poke", product.id)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inverted_report_range_is_rejected() {
    let env = TestEnv::start().await;
    let admin = env.admin_client("owner@example.com").await;

    let response = admin
        .get(env.admin("/admin/api/analytics?from=2026-03-10&to=2026-03-01"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
