//! Integration tests for Fernleaf.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fernleaf-integration-tests
//! ```
//!
//! Both servers run in-process on ephemeral ports against the in-memory
//! backend, so no database or network access is needed. Each test gets its
//! own [`TestEnv`]; the storefront and admin share its backend the way they
//! share one backend project in production.
//!
//! # Test Categories
//!
//! - `storefront_cart` - Guest and signed-in carts
//! - `checkout` - Order placement and totals
//! - `admin_access` - Admin gate and catalog management
//! - `admin_media` - Image uploads
//! - `analytics` - Counters and reports

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};

use fernleaf_admin::config::AdminConfig;
use fernleaf_core::{Price, ProductId, UserId};
use fernleaf_storefront::backend::{MemoryBackend, MemoryStorage};
use fernleaf_storefront::config::{BackendConfig, DEFAULT_IMAGE_FALLBACK_URL, StorefrontConfig};
use fernleaf_storefront::images::ImageProbe;
use fernleaf_storefront::models::Product;
use fernleaf_storefront::services::checkout::CheckoutPricing;
use fernleaf_storefront::state::Backends;

/// A session signing secret long enough for a cookie key.
const TEST_SESSION_SECRET: &str =
    "Qm3v9XkT2pLw7RzA8sHc4NdY6fUj1GeB5tKo0iVxMqW3rZnJ7yLh2aPd9cFs4uEg";

pub const PASSWORD: &str = "correct-horse-battery";

/// Every image URL loads.
pub struct AlwaysAvailable;

#[async_trait]
impl ImageProbe for AlwaysAvailable {
    async fn is_available(&self, _url: &str) -> bool {
        true
    }
}

/// One storefront, one admin server and the backend they share.
pub struct TestEnv {
    pub backend: MemoryBackend,
    pub storage: MemoryStorage,
    pub storefront: fernleaf_storefront::state::AppState,
    pub storefront_url: String,
    pub admin_url: String,
}

fn backend_config() -> BackendConfig {
    BackendConfig::new(
        "http://backend.test/".parse().unwrap(),
        SecretString::from("test-anon-key"),
    )
}

fn backends(backend: &MemoryBackend, storage: &MemoryStorage) -> Backends {
    Backends {
        auth: Arc::new(backend.clone()),
        data: Arc::new(backend.clone()),
        storage: Arc::new(storage.clone()),
        probe: Arc::new(AlwaysAvailable),
    }
}

async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

impl TestEnv {
    /// Start both servers on ephemeral ports.
    pub async fn start() -> Self {
        let backend = MemoryBackend::new();
        let storage = MemoryStorage::new();

        let storefront_config = StorefrontConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
            base_url: "http://storefront.test".to_string(),
            session_secret: SecretString::from(TEST_SESSION_SECRET),
            backend: backend_config(),
            checkout: CheckoutPricing::default(),
            image_fallback_url: DEFAULT_IMAGE_FALLBACK_URL.to_string(),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let storefront = fernleaf_storefront::state::AppState::new(
            storefront_config,
            backends(&backend, &storage),
        );
        let storefront_url = serve(fernleaf_storefront::app(storefront.clone()).unwrap()).await;

        let admin_config = AdminConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
            base_url: "http://admin.test".to_string(),
            session_secret: SecretString::from(TEST_SESSION_SECRET),
            backend: backend_config(),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let admin = fernleaf_admin::state::AppState::new(admin_config, backends(&backend, &storage));
        let admin_url = serve(fernleaf_admin::app(admin).unwrap()).await;

        Self {
            backend,
            storage,
            storefront,
            storefront_url,
            admin_url,
        }
    }

    /// A browser-like client with its own cookie jar.
    #[must_use]
    pub fn client() -> Client {
        Client::builder().cookie_store(true).build().unwrap()
    }

    #[must_use]
    pub fn store(&self, path: &str) -> String {
        format!("{}{path}", self.storefront_url)
    }

    #[must_use]
    pub fn admin(&self, path: &str) -> String {
        format!("{}{path}", self.admin_url)
    }

    /// Insert an active product.
    #[must_use]
    pub fn seed_product(&self, name: &str, cents: i64) -> Product {
        self.backend
            .seed_product(name, Price::from_cents(cents).unwrap())
    }

    /// Wait for queued analytics and cart writes to land.
    pub async fn settle(&self) {
        self.storefront.outbox().flush().await;
    }

    /// Create an account through the storefront; `client` ends up signed in.
    pub async fn sign_up(&self, client: &Client, email: &str) -> UserId {
        let response = client
            .post(self.store("/api/auth/signup"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        serde_json::from_value(body["user"]["id"].clone()).unwrap()
    }

    pub async fn sign_in(&self, client: &Client, email: &str) -> reqwest::Response {
        client
            .post(self.store("/api/auth/signin"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap()
    }

    pub async fn sign_out(&self, client: &Client) {
        let response = client
            .post(self.store("/api/auth/signout"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    /// Sign up through the storefront, grant the admin flag and sign in to
    /// the admin server. Returns a client holding the admin session.
    pub async fn admin_client(&self, email: &str) -> Client {
        let client = Self::client();
        let user_id = self.sign_up(&client, email).await;
        self.backend.set_admin(user_id, true);

        let response = self.admin_sign_in(&client, email).await;
        assert_eq!(response.status(), StatusCode::OK);
        client
    }

    pub async fn admin_sign_in(&self, client: &Client, email: &str) -> reqwest::Response {
        client
            .post(self.admin("/admin/api/auth/signin"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap()
    }

    pub async fn add_to_cart(&self, client: &Client, product_id: ProductId, quantity: u32) -> Value {
        let response = client
            .post(self.store("/api/cart/items"))
            .json(&json!({ "product_id": product_id, "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.unwrap()
    }

    pub async fn cart(&self, client: &Client) -> Value {
        client
            .get(self.store("/api/cart"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

/// Read a JSON money field.
#[must_use]
pub fn price(value: &Value) -> Price {
    serde_json::from_value(value.clone()).unwrap()
}

#[must_use]
pub fn cents(amount: i64) -> Price {
    Price::from_cents(amount).unwrap()
}
