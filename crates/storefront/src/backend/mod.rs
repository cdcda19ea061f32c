//! Managed backend clients.
//!
//! # Architecture
//!
//! The backend platform owns auth, the relational database (with row-level
//! security) and object storage. Fernleaf consumes its REST contract:
//!
//! - `/auth/v1` - sign-up, password sign-in, refresh, sign-out ([`AuthClient`])
//! - `/rest/v1` - table reads/writes and the analytics RPC ([`DataClient`])
//! - `/storage/v1` - product image objects ([`ObjectStorage`])
//!
//! Handlers and services depend on the traits, never on the HTTP clients, so
//! the same code runs against [`MemoryBackend`] in tests.
//!
//! Requests made on behalf of a signed-in user go through a client scoped with
//! [`DataClient::for_user`], which forwards the user's access token so RLS
//! policies see the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use fernleaf_storefront::backend::prelude::*;
//!
//! let data = RestClient::new(&config.backend)?;
//! let product = data.get_product_by_slug(&slug).await?;
//!
//! let mine = data.for_user(&tokens.access_token);
//! let orders = mine.list_orders(&OrderFilter::default()).await?;
//! ```

mod auth;
mod cache;
mod memory;
mod rest;
mod storage;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::broadcast;

use fernleaf_core::{
    AnalyticsMetric, CartId, CategoryId, Email, InteractionType, MediaId, OrderId, ProductId,
    Slug, UserId,
};

use crate::models::{
    AnalyticsRange, AuthUser, CartItemRow, Category, CategoryInput, NewCartItem, NewMedia,
    NewOrder, NewOrderItem, NewProduct, NewProfile, Order, OrderFilter, OrderItem, OrderUpdate,
    Product, ProductAnalytics, ProductMedia, ProductQuery, ProductUpdate, ProfileUpdate,
    ServerCart, SessionTokens, UserProfile, WishlistEntry,
};

pub use auth::AuthApi;
pub use memory::{MemoryBackend, MemoryStorage};
pub use rest::RestClient;
pub use storage::StorageApi;

/// Import this to call store methods on a concrete backend type.
pub mod prelude {
    pub use super::{
        AnalyticsStore, AuthClient, CartStore, CatalogStore, DataClient, InteractionStore,
        MediaStore, ObjectStorage, OrderStore, ProfileStore, WishlistStore,
    };
}

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request.
    #[error("Backend returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, invalid or expired credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// Row-level security or a storage policy refused the request.
    #[error("Forbidden")]
    Forbidden,

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The configured backend URL could not be joined with an API path.
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    /// Map an error response to a variant.
    ///
    /// Understands PostgREST bodies (`code`, `message`), auth service bodies
    /// (`error_code`, `msg`, or the older `error`, `error_description`) and
    /// storage bodies (`statusCode`, `error`, `message`).
    #[must_use]
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let value: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
        let first_str = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| value.get(*k).and_then(serde_json::Value::as_str))
                .map(str::to_owned)
        };

        let code = first_str(&["code", "error_code", "error"]);
        let message = first_str(&["message", "msg", "error_description", "error"])
            .unwrap_or_else(|| body.chars().take(200).collect());

        match (status, code.as_deref()) {
            (_, Some("23505" | "user_already_exists" | "email_exists" | "Duplicate")) => {
                Self::Conflict(message)
            }
            (_, Some("PGRST116")) | (StatusCode::NOT_FOUND, _) => Self::NotFound(message),
            (_, Some("invalid_credentials" | "invalid_grant" | "bad_jwt" | "PGRST301"))
            | (StatusCode::UNAUTHORIZED, _) => Self::Unauthorized,
            (_, Some("42501")) | (StatusCode::FORBIDDEN, _) => Self::Forbidden,
            (StatusCode::CONFLICT, _) => Self::Conflict(message),
            _ => Self::Api {
                status: status.as_u16(),
                code,
                message,
            },
        }
    }

    /// Whether the caller sent something the backend refused as invalid.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 400 && *status < 500)
    }
}

/// Return the body of a successful response, or the error it describes.
///
/// Rate limiting is reported with the `Retry-After` hint. Server errors are
/// logged at `error`, rejected requests at `warn`.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String, BackendError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(BackendError::RateLimited(retry_after));
    }

    let body = response.text().await?;

    if !status.is_success() {
        let snippet = body.chars().take(500).collect::<String>();
        if status.is_server_error() {
            tracing::error!(status = %status, body = %snippet, "Backend returned server error");
        } else {
            tracing::warn!(status = %status, body = %snippet, "Backend rejected request");
        }
        return Err(BackendError::from_response(status, &body));
    }

    Ok(body)
}

/// Parse a JSON response body, logging what failed to parse.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        BackendError::Parse(e)
    })
}

// =============================================================================
// Auth
// =============================================================================

/// A signed-in user and their tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub user: AuthUser,
    pub tokens: SessionTokens,
}

/// Result of a sign-up. `tokens` is `None` when the backend requires email
/// confirmation before the first sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub user: AuthUser,
    pub tokens: Option<SessionTokens>,
}

/// Auth state changes published by an [`AuthClient`].
///
/// Events that leave a user signed in carry that user's access token, so
/// listeners can read through a client scoped to them.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(SignedInUser),
    SignedOut,
    TokenRefreshed(SignedInUser),
    UserUpdated(SignedInUser),
}

/// The user behind an [`AuthEvent`] and the token they now hold.
#[derive(Debug, Clone)]
pub struct SignedInUser {
    pub user: AuthUser,
    pub access_token: SecretString,
}

impl SignedInUser {
    #[must_use]
    pub fn new(user: AuthUser, access_token: &str) -> Self {
        Self {
            user,
            access_token: SecretString::from(access_token),
        }
    }
}

impl AuthEvent {
    /// The user the event leaves signed in, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&AuthUser> {
        match self.signed_in() {
            Some(signed_in) => Some(&signed_in.user),
            None => None,
        }
    }

    /// The user and access token the event leaves signed in, if any.
    #[must_use]
    pub const fn signed_in(&self) -> Option<&SignedInUser> {
        match self {
            Self::SignedIn(signed_in)
            | Self::TokenRefreshed(signed_in)
            | Self::UserUpdated(signed_in) => Some(signed_in),
            Self::SignedOut => None,
        }
    }
}

/// Auth service operations.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Register a new account.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: Option<&str>,
    ) -> Result<SignUp, BackendError>;

    /// Exchange email and password for tokens.
    async fn sign_in(&self, email: &Email, password: &SecretString)
    -> Result<AuthGrant, BackendError>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    /// Resolve an access token to its user.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;

    /// Exchange a refresh token for fresh tokens.
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthGrant, BackendError>;

    /// Subscribe to auth state changes for as long as the receiver lives.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

// =============================================================================
// Data
// =============================================================================

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: UserId) -> Result<Option<UserProfile>, BackendError>;
    async fn create_profile(&self, profile: &NewProfile) -> Result<UserProfile, BackendError>;
    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, BackendError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self, include_inactive: bool)
    -> Result<Vec<Category>, BackendError>;
    async fn create_category(&self, input: &CategoryInput) -> Result<Category, BackendError>;
    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, BackendError>;
    async fn delete_category(&self, id: CategoryId) -> Result<bool, BackendError>;

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, BackendError>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError>;
    async fn get_product_by_slug(&self, slug: &Slug) -> Result<Option<Product>, BackendError>;
    /// Active products sharing the product's category, excluding the product.
    async fn related_products(
        &self,
        product: &Product,
        limit: u32,
    ) -> Result<Vec<Product>, BackendError>;
    async fn create_product(&self, product: &NewProduct) -> Result<Product, BackendError>;
    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, BackendError>;
    async fn delete_product(&self, id: ProductId) -> Result<bool, BackendError>;
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn insert_media(&self, media: &NewMedia) -> Result<ProductMedia, BackendError>;
    async fn get_media(&self, id: MediaId) -> Result<Option<ProductMedia>, BackendError>;
    async fn delete_media(&self, id: MediaId) -> Result<bool, BackendError>;
    /// Mark one media row primary and clear the flag on its siblings.
    async fn set_primary_media(
        &self,
        product_id: ProductId,
        media_id: MediaId,
    ) -> Result<(), BackendError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_cart(&self, user_id: UserId) -> Result<Option<ServerCart>, BackendError>;
    async fn create_cart(&self, user_id: UserId) -> Result<ServerCart, BackendError>;
    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRow>, BackendError>;
    /// Write the line for `item.product_id`, replacing any existing row for
    /// that product in the cart.
    async fn upsert_cart_item(&self, item: &NewCartItem) -> Result<CartItemRow, BackendError>;
    async fn update_cart_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), BackendError>;
    async fn delete_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<(), BackendError>;
    async fn clear_cart_items(&self, cart_id: CartId) -> Result<(), BackendError>;
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Call the `update_product_analytics` procedure: upsert today's row for
    /// the product and add `increment` to one counter.
    async fn update_product_analytics(
        &self,
        product_id: ProductId,
        metric: AnalyticsMetric,
        increment: i64,
    ) -> Result<(), BackendError>;

    async fn list_product_analytics(
        &self,
        range: &AnalyticsRange,
    ) -> Result<Vec<ProductAnalytics>, BackendError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order; the database assigns the order number.
    async fn create_order(&self, order: &NewOrder) -> Result<Order, BackendError>;
    async fn insert_order_items(
        &self,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, BackendError>;
    /// Orders with their items, newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, BackendError>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, BackendError>;
    async fn update_order(&self, id: OrderId, update: &OrderUpdate) -> Result<Order, BackendError>;
}

#[async_trait]
pub trait WishlistStore: Send + Sync {
    async fn list_wishlist(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, BackendError>;
    /// Idempotent.
    async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), BackendError>;
    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, BackendError>;
    async fn is_wishlisted(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, BackendError>;
}

#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn list_interactions(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<InteractionType>, BackendError>;
    /// Returns `true` if the flag was newly set.
    async fn record_interaction(
        &self,
        user_id: UserId,
        product_id: ProductId,
        kind: InteractionType,
    ) -> Result<bool, BackendError>;
    /// Returns `true` if a flag was cleared.
    async fn remove_interaction(
        &self,
        user_id: UserId,
        product_id: ProductId,
        kind: InteractionType,
    ) -> Result<bool, BackendError>;
}

/// Every table the storefront and admin touch.
#[async_trait]
pub trait DataClient:
    ProfileStore
    + CatalogStore
    + MediaStore
    + CartStore
    + AnalyticsStore
    + OrderStore
    + WishlistStore
    + InteractionStore
{
    /// A client that acts as the user owning `access_token`.
    fn for_user(&self, access_token: &str) -> Arc<dyn DataClient>;

    /// Cheap round-trip used by readiness checks.
    async fn health_check(&self) -> Result<(), BackendError>;
}

// =============================================================================
// Storage
// =============================================================================

/// Object storage for product images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` inside the configured bucket.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<(), BackendError>;

    /// Delete the object at `path`.
    async fn remove(&self, path: &str) -> Result<(), BackendError>;

    /// Public URL of the object at `path`.
    fn public_url(&self, path: &str) -> String;

    /// A resized rendition of `src` if it is an object of this bucket.
    fn render_url(&self, src: &str, width: u32, quality: u8) -> Option<String>;

    /// A storage client that acts as the user owning `access_token`.
    fn for_user(&self, access_token: &str) -> Arc<dyn ObjectStorage>;
}
