//! In-memory backend for tests and local development.
//!
//! Implements every collaborator trait against process memory, including
//! the behaviors the database provides: the daily analytics upsert, the
//! order-number trigger, unique constraints and `ON DELETE` rules. Row-level
//! security is modelled for profile reads only; every other table is
//! visible to every caller.
//!
//! Operations can be made to fail with [`MemoryBackend::fail`] to exercise
//! best-effort paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;

use fernleaf_core::{
    AnalyticsMetric, CartId, CartItemId, CategoryId, Email, InteractionType, MediaId, OrderId,
    OrderItemId, OrderNumber, Price, ProductId, Slug, UserId, VariantId,
};

use super::{
    AnalyticsStore, AuthClient, AuthEvent, AuthGrant, BackendError, CartStore, CatalogStore,
    DataClient, InteractionStore, MediaStore, ObjectStorage, OrderStore, ProfileStore, SignUp,
    SignedInUser, WishlistStore,
};
use crate::models::{
    AnalyticsRange, AuthUser, CartItemRow, Category, CategoryInput, NewCartItem, NewMedia,
    NewOrder, NewOrderItem, NewProduct, NewProfile, Order, OrderFilter, OrderItem, OrderUpdate,
    Product, ProductAnalytics, ProductMedia, ProductQuery, ProductUpdate, ProductVariant,
    ProfileUpdate, ServerCart, SessionTokens, UserProfile, WishlistEntry,
};

fn injected(operation: &str) -> BackendError {
    BackendError::Api {
        status: 500,
        code: None,
        message: format!("injected failure: {operation}"),
    }
}

fn check_violation(message: &str) -> BackendError {
    BackendError::Api {
        status: 400,
        code: Some("23514".to_string()),
        message: message.to_string(),
    }
}

fn foreign_key_violation(message: &str) -> BackendError {
    BackendError::Api {
        status: 409,
        code: Some("23503".to_string()),
        message: message.to_string(),
    }
}

// =============================================================================
// MemoryBackend
// =============================================================================

/// Auth and data backend held in memory. Clones share state.
///
/// Profile reads follow the owner-or-admin row policy: a client from
/// [`MemoryBackend::anonymous`] sees no profiles, and one from
/// [`DataClient::for_user`] sees its own (or all, for an admin). A client
/// from [`MemoryBackend::new`] reads as the service role.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
    viewer: Viewer,
}

/// Whose row policies a client reads under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Viewer {
    Service,
    Anonymous,
    User(UserId),
}

struct MemoryInner {
    state: Mutex<MemoryState>,
    events: broadcast::Sender<AuthEvent>,
    order_sequence: AtomicU64,
}

struct MemoryUser {
    id: UserId,
    email: String,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, MemoryUser>,
    access_tokens: HashMap<String, UserId>,
    refresh_tokens: HashMap<String, UserId>,
    profiles: HashMap<UserId, UserProfile>,
    categories: Vec<Category>,
    products: Vec<Product>,
    media: Vec<ProductMedia>,
    carts: Vec<ServerCart>,
    cart_items: Vec<CartItemRow>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    analytics: Vec<ProductAnalytics>,
    wishlists: Vec<(UserId, ProductId)>,
    interactions: Vec<(UserId, ProductId, InteractionType)>,
    failing: HashSet<String>,
    calls: usize,
}

impl MemoryState {
    fn user_by_id(&self, id: UserId) -> Option<&MemoryUser> {
        self.users.values().find(|u| u.id == id)
    }

    fn auth_user(&self, id: UserId) -> Option<AuthUser> {
        self.user_by_id(id).map(|u| AuthUser {
            id: u.id,
            email: Some(u.email.clone()),
        })
    }

    fn issue_tokens(&mut self, user_id: UserId) -> SessionTokens {
        let access_token = format!("mem-access-{}", uuid::Uuid::new_v4());
        let refresh_token = format!("mem-refresh-{}", uuid::Uuid::new_v4());
        self.access_tokens.insert(access_token.clone(), user_id);
        self.refresh_tokens.insert(refresh_token.clone(), user_id);
        SessionTokens {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    /// A product with its media joined and sorted.
    fn joined(&self, product: &Product) -> Product {
        let mut product = product.clone();
        product.media = self
            .media
            .iter()
            .filter(|m| m.product_id == product.id)
            .cloned()
            .collect();
        product.sort_media();
        product
    }

    fn product(&self, id: ProductId) -> Option<Product> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .map(|p| self.joined(p))
    }

    fn category_slug(&self, id: Option<CategoryId>) -> Option<&Slug> {
        let id = id?;
        self.categories.iter().find(|c| c.id == id).map(|c| &c.slug)
    }

    fn order_with_items(&self, order: &Order) -> Order {
        let mut order = order.clone();
        order.items = self
            .order_items
            .iter()
            .filter(|i| i.order_id == order.id)
            .cloned()
            .collect();
        order
    }

    fn ensure_product(&self, id: ProductId) -> Result<(), BackendError> {
        if self.products.iter().any(|p| p.id == id) {
            Ok(())
        } else {
            Err(foreign_key_violation(&format!("product {id} does not exist")))
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(MemoryInner {
                state: Mutex::new(MemoryState::default()),
                events,
                order_sequence: AtomicU64::new(1),
            }),
            viewer: Viewer::Service,
        }
    }

    /// A client sharing this state that reads as an anonymous visitor.
    #[must_use]
    pub fn anonymous(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            viewer: Viewer::Anonymous,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock state for one backend call, counting it and applying injected
    /// failures.
    fn begin(&self, operation: &str) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        let mut state = self.state();
        state.calls += 1;
        if state.failing.contains(operation) {
            return Err(injected(operation));
        }
        Ok(state)
    }

    fn publish(&self, event: AuthEvent) {
        let _ = self.inner.events.send(event);
    }

    /// Make every later call of `operation` (a trait method name) fail.
    pub fn fail(&self, operation: &str) {
        self.state().failing.insert(operation.to_string());
    }

    /// Undo [`MemoryBackend::fail`].
    pub fn recover(&self, operation: &str) {
        self.state().failing.remove(operation);
    }

    /// Number of backend calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state().calls
    }

    /// Insert an active product directly, bypassing the admin API.
    #[must_use]
    pub fn seed_product(&self, name: &str, price: Price) -> Product {
        let now = Utc::now();
        let id = ProductId::generate();
        let product = Product {
            id,
            name: name.to_string(),
            slug: Slug::from_name_or_id(name, id.as_uuid()),
            description: None,
            price,
            compare_price: None,
            stock_count: 10,
            is_active: true,
            is_featured: false,
            category_id: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            media: Vec::new(),
            variants: Vec::new(),
        };
        self.state().products.push(product.clone());
        product
    }

    /// Attach a variant to a seeded product.
    #[must_use]
    pub fn seed_variant(&self, product_id: ProductId, name: &str, price: Option<Price>) -> ProductVariant {
        let variant = ProductVariant {
            id: VariantId::generate(),
            product_id,
            name: name.to_string(),
            sku: None,
            price,
            stock_count: 10,
            attributes: serde_json::Value::Null,
        };
        let mut state = self.state();
        if let Some(product) = state.products.iter_mut().find(|p| p.id == product_id) {
            product.variants.push(variant.clone());
        }
        variant
    }

    /// Set or clear a user's admin flag, creating the profile if needed.
    pub fn set_admin(&self, user_id: UserId, is_admin: bool) {
        let mut state = self.state();
        let email = state.user_by_id(user_id).map(|u| u.email.clone());
        state
            .profiles
            .entry(user_id)
            .or_insert_with(|| UserProfile {
                id: user_id,
                email,
                full_name: None,
                phone: None,
                avatar_url: None,
                is_admin: false,
                created_at: Some(Utc::now()),
            })
            .is_admin = is_admin;
    }

    /// Delete a user's profile row.
    pub fn remove_profile(&self, user_id: UserId) {
        self.state().profiles.remove(&user_id);
    }

    /// Every `cart_items` row.
    #[must_use]
    pub fn cart_item_rows(&self) -> Vec<CartItemRow> {
        self.state().cart_items.clone()
    }

    /// Every `shopping_carts` row.
    #[must_use]
    pub fn cart_rows(&self) -> Vec<ServerCart> {
        self.state().carts.clone()
    }

    /// Every `product_analytics` row.
    #[must_use]
    pub fn analytics_rows(&self) -> Vec<ProductAnalytics> {
        self.state().analytics.clone()
    }
}

// =============================================================================
// Auth
// =============================================================================

#[async_trait]
impl AuthClient for MemoryBackend {
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        _full_name: Option<&str>,
    ) -> Result<SignUp, BackendError> {
        let (user, tokens) = {
            let mut state = self.begin("sign_up")?;
            let key = email.as_str().to_lowercase();
            if state.users.contains_key(&key) {
                return Err(BackendError::Conflict("User already registered".to_string()));
            }
            let id = UserId::generate();
            state.users.insert(
                key,
                MemoryUser {
                    id,
                    email: email.as_str().to_string(),
                    password: password.expose_secret().to_string(),
                },
            );
            let tokens = state.issue_tokens(id);
            let user = AuthUser {
                id,
                email: Some(email.as_str().to_string()),
            };
            (user, tokens)
        };

        self.publish(AuthEvent::SignedIn(SignedInUser::new(
            user.clone(),
            &tokens.access_token,
        )));
        Ok(SignUp {
            user,
            tokens: Some(tokens),
        })
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthGrant, BackendError> {
        let grant = {
            let mut state = self.begin("sign_in")?;
            let (id, stored_email) = match state.users.get(&email.as_str().to_lowercase()) {
                Some(user) if user.password == password.expose_secret() => {
                    (user.id, user.email.clone())
                }
                _ => return Err(BackendError::Unauthorized),
            };
            AuthGrant {
                user: AuthUser {
                    id,
                    email: Some(stored_email),
                },
                tokens: state.issue_tokens(id),
            }
        };

        self.publish(AuthEvent::SignedIn(SignedInUser::new(
            grant.user.clone(),
            &grant.tokens.access_token,
        )));
        Ok(grant)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        {
            let mut state = self.begin("sign_out")?;
            if let Some(user_id) = state.access_tokens.remove(access_token) {
                state.refresh_tokens.retain(|_, id| *id != user_id);
            }
        }
        self.publish(AuthEvent::SignedOut);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let state = self.begin("get_user")?;
        state
            .access_tokens
            .get(access_token)
            .and_then(|id| state.auth_user(*id))
            .ok_or(BackendError::Unauthorized)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthGrant, BackendError> {
        let grant = {
            let mut state = self.begin("refresh_session")?;
            let user_id = state
                .refresh_tokens
                .remove(refresh_token)
                .ok_or(BackendError::Unauthorized)?;
            let user = state.auth_user(user_id).ok_or(BackendError::Unauthorized)?;
            AuthGrant {
                user,
                tokens: state.issue_tokens(user_id),
            }
        };

        self.publish(AuthEvent::TokenRefreshed(SignedInUser::new(
            grant.user.clone(),
            &grant.tokens.access_token,
        )));
        Ok(grant)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }
}

// =============================================================================
// Data
// =============================================================================

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn get_profile(&self, id: UserId) -> Result<Option<UserProfile>, BackendError> {
        let state = self.begin("get_profile")?;
        let visible = match self.viewer {
            Viewer::Service => true,
            Viewer::Anonymous => false,
            Viewer::User(viewer) => {
                viewer == id || state.profiles.get(&viewer).is_some_and(|p| p.is_admin)
            }
        };
        Ok(state.profiles.get(&id).filter(|_| visible).cloned())
    }

    async fn create_profile(&self, profile: &NewProfile) -> Result<UserProfile, BackendError> {
        let mut state = self.begin("create_profile")?;
        if state.profiles.contains_key(&profile.id) {
            return Err(BackendError::Conflict(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        let row = UserProfile {
            id: profile.id,
            email: Some(profile.email.clone()),
            full_name: profile.full_name.clone(),
            phone: None,
            avatar_url: None,
            is_admin: false,
            created_at: Some(Utc::now()),
        };
        state.profiles.insert(profile.id, row.clone());
        Ok(row)
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, BackendError> {
        let mut state = self.begin("update_profile")?;
        let profile = state
            .profiles
            .get_mut(&id)
            .ok_or_else(|| BackendError::NotFound("profile".to_string()))?;
        update.apply_to(profile);
        Ok(profile.clone())
    }
}

#[async_trait]
impl CatalogStore for MemoryBackend {
    async fn list_categories(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<Category>, BackendError> {
        let state = self.begin("list_categories")?;
        let mut categories: Vec<Category> = state
            .categories
            .iter()
            .filter(|c| include_inactive || c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(categories)
    }

    async fn create_category(&self, input: &CategoryInput) -> Result<Category, BackendError> {
        let mut state = self.begin("create_category")?;
        let slug = input
            .slug
            .clone()
            .ok_or_else(|| check_violation("category slug is required"))?;
        if state.categories.iter().any(|c| c.slug == slug) {
            return Err(BackendError::Conflict(format!("category slug {slug} exists")));
        }
        let category = Category {
            id: CategoryId::generate(),
            name: input.name.clone(),
            slug,
            description: input.description.clone(),
            image_url: input.image_url.clone(),
            sort_order: input.sort_order,
            is_active: input.is_active,
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, BackendError> {
        let mut state = self.begin("update_category")?;
        if let Some(slug) = &input.slug
            && state.categories.iter().any(|c| c.id != id && &c.slug == slug)
        {
            return Err(BackendError::Conflict(format!("category slug {slug} exists")));
        }
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| BackendError::NotFound("category".to_string()))?;
        category.name.clone_from(&input.name);
        if let Some(slug) = &input.slug {
            category.slug = slug.clone();
        }
        category.description.clone_from(&input.description);
        category.image_url.clone_from(&input.image_url);
        category.sort_order = input.sort_order;
        category.is_active = input.is_active;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, BackendError> {
        let mut state = self.begin("delete_category")?;
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        for product in &mut state.products {
            if product.category_id == Some(id) {
                product.category_id = None;
            }
        }
        Ok(state.categories.len() != before)
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, BackendError> {
        let state = self.begin("list_products")?;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| query.matches(p, state.category_slug(p.category_id)))
            .map(|p| state.joined(p))
            .collect();
        query.sort_products(&mut products);
        Ok(products
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        let state = self.begin("get_product")?;
        Ok(state.product(id))
    }

    async fn get_product_by_slug(&self, slug: &Slug) -> Result<Option<Product>, BackendError> {
        let state = self.begin("get_product_by_slug")?;
        Ok(state
            .products
            .iter()
            .find(|p| &p.slug == slug)
            .map(|p| state.joined(p)))
    }

    async fn related_products(
        &self,
        product: &Product,
        limit: u32,
    ) -> Result<Vec<Product>, BackendError> {
        let state = self.begin("related_products")?;
        let mut related: Vec<Product> = state
            .products
            .iter()
            .filter(|p| p.id != product.id && p.is_active)
            .filter(|p| product.category_id.is_none() || p.category_id == product.category_id)
            .map(|p| state.joined(p))
            .collect();
        related.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        related.truncate(limit as usize);
        Ok(related)
    }

    async fn create_product(&self, input: &NewProduct) -> Result<Product, BackendError> {
        let mut state = self.begin("create_product")?;
        if state.products.iter().any(|p| p.slug == input.slug) {
            return Err(BackendError::Conflict(format!(
                "product slug {} exists",
                input.slug
            )));
        }
        let now = Utc::now();
        let product = Product {
            id: ProductId::generate(),
            name: input.name.clone(),
            slug: input.slug.clone(),
            description: input.description.clone(),
            price: input.price,
            compare_price: input.compare_price,
            stock_count: input.stock_count,
            is_active: input.is_active,
            is_featured: input.is_featured,
            category_id: input.category_id,
            tags: input.tags.clone(),
            created_at: now,
            updated_at: now,
            media: Vec::new(),
            variants: Vec::new(),
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, BackendError> {
        let mut state = self.begin("update_product")?;
        if let Some(slug) = &update.slug
            && state.products.iter().any(|p| p.id != id && &p.slug == slug)
        {
            return Err(BackendError::Conflict(format!("product slug {slug} exists")));
        }
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::NotFound("product".to_string()))?;
        update.apply_to(product);
        product.updated_at = Utc::now();
        let product = product.clone();
        Ok(state.joined(&product))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, BackendError> {
        let mut state = self.begin("delete_product")?;
        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        state.media.retain(|m| m.product_id != id);
        state.cart_items.retain(|i| i.product_id != id);
        state.wishlists.retain(|(_, p)| *p != id);
        state.interactions.retain(|(_, p, _)| *p != id);
        state.analytics.retain(|a| a.product_id != id);
        for item in &mut state.order_items {
            if item.product_id == Some(id) {
                item.product_id = None;
            }
        }
        Ok(state.products.len() != before)
    }
}

#[async_trait]
impl MediaStore for MemoryBackend {
    async fn insert_media(&self, media: &NewMedia) -> Result<ProductMedia, BackendError> {
        let mut state = self.begin("insert_media")?;
        state.ensure_product(media.product_id)?;
        let row = ProductMedia {
            id: MediaId::generate(),
            product_id: media.product_id,
            url: media.url.clone(),
            storage_path: Some(media.storage_path.clone()),
            alt_text: media.alt_text.clone(),
            media_type: media.media_type.clone(),
            sort_order: media.sort_order,
            is_primary: media.is_primary,
        };
        state.media.push(row.clone());
        Ok(row)
    }

    async fn get_media(&self, id: MediaId) -> Result<Option<ProductMedia>, BackendError> {
        let state = self.begin("get_media")?;
        Ok(state.media.iter().find(|m| m.id == id).cloned())
    }

    async fn delete_media(&self, id: MediaId) -> Result<bool, BackendError> {
        let mut state = self.begin("delete_media")?;
        let before = state.media.len();
        state.media.retain(|m| m.id != id);
        Ok(state.media.len() != before)
    }

    async fn set_primary_media(
        &self,
        product_id: ProductId,
        media_id: MediaId,
    ) -> Result<(), BackendError> {
        let mut state = self.begin("set_primary_media")?;
        if !state
            .media
            .iter()
            .any(|m| m.id == media_id && m.product_id == product_id)
        {
            return Err(BackendError::NotFound(format!("media {media_id}")));
        }
        for media in state.media.iter_mut().filter(|m| m.product_id == product_id) {
            media.is_primary = media.id == media_id;
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryBackend {
    async fn find_cart(&self, user_id: UserId) -> Result<Option<ServerCart>, BackendError> {
        let state = self.begin("find_cart")?;
        Ok(state.carts.iter().find(|c| c.user_id == user_id).copied())
    }

    async fn create_cart(&self, user_id: UserId) -> Result<ServerCart, BackendError> {
        let mut state = self.begin("create_cart")?;
        if state.carts.iter().any(|c| c.user_id == user_id) {
            return Err(BackendError::Conflict(format!(
                "cart for user {user_id} exists"
            )));
        }
        let cart = ServerCart {
            id: CartId::generate(),
            user_id,
        };
        state.carts.push(cart);
        Ok(cart)
    }

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRow>, BackendError> {
        let state = self.begin("list_cart_items")?;
        Ok(state
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .map(|i| CartItemRow {
                product: state.product(i.product_id),
                ..i.clone()
            })
            .collect())
    }

    async fn upsert_cart_item(&self, item: &NewCartItem) -> Result<CartItemRow, BackendError> {
        let mut state = self.begin("upsert_cart_item")?;
        if item.quantity < 1 {
            return Err(check_violation("cart item quantity must be at least 1"));
        }
        if !state.carts.iter().any(|c| c.id == item.cart_id) {
            return Err(foreign_key_violation("cart does not exist"));
        }
        state.ensure_product(item.product_id)?;
        // UNIQUE (cart_id, product_id), merged on conflict
        if let Some(existing) = state
            .cart_items
            .iter_mut()
            .find(|i| i.cart_id == item.cart_id && i.product_id == item.product_id)
        {
            existing.variant_id = item.variant_id;
            existing.quantity = item.quantity;
            existing.unit_price = item.unit_price;
            return Ok(existing.clone());
        }
        let row = CartItemRow {
            id: CartItemId::generate(),
            cart_id: item.cart_id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            product: None,
        };
        state.cart_items.push(row.clone());
        Ok(row)
    }

    async fn update_cart_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), BackendError> {
        let mut state = self.begin("update_cart_item_quantity")?;
        if quantity < 1 {
            return Err(check_violation("cart item quantity must be at least 1"));
        }
        for item in state
            .cart_items
            .iter_mut()
            .filter(|i| i.cart_id == cart_id && i.product_id == product_id)
        {
            item.quantity = quantity;
        }
        Ok(())
    }

    async fn delete_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        let mut state = self.begin("delete_cart_item")?;
        state
            .cart_items
            .retain(|i| !(i.cart_id == cart_id && i.product_id == product_id));
        Ok(())
    }

    async fn clear_cart_items(&self, cart_id: CartId) -> Result<(), BackendError> {
        let mut state = self.begin("clear_cart_items")?;
        state.cart_items.retain(|i| i.cart_id != cart_id);
        Ok(())
    }
}

#[async_trait]
impl AnalyticsStore for MemoryBackend {
    async fn update_product_analytics(
        &self,
        product_id: ProductId,
        metric: AnalyticsMetric,
        increment: i64,
    ) -> Result<(), BackendError> {
        let mut state = self.begin("update_product_analytics")?;
        state.ensure_product(product_id)?;
        let today = Utc::now().date_naive();
        if let Some(row) = state
            .analytics
            .iter_mut()
            .find(|r| r.product_id == product_id && r.date == today)
        {
            row.add(metric, increment);
        } else {
            let mut row = ProductAnalytics::empty(product_id, today);
            row.add(metric, increment);
            state.analytics.push(row);
        }
        Ok(())
    }

    async fn list_product_analytics(
        &self,
        range: &AnalyticsRange,
    ) -> Result<Vec<ProductAnalytics>, BackendError> {
        let state = self.begin("list_product_analytics")?;
        let mut rows: Vec<ProductAnalytics> = state
            .analytics
            .iter()
            .filter(|r| range.contains(r))
            .copied()
            .collect();
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }
}

#[async_trait]
impl OrderStore for MemoryBackend {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, BackendError> {
        let mut state = self.begin("create_order")?;
        let now = Utc::now();
        let sequence = self.inner.order_sequence.fetch_add(1, Ordering::Relaxed);
        let row = Order {
            id: OrderId::generate(),
            order_number: OrderNumber::format(now.date_naive(), sequence),
            user_id: Some(order.user_id),
            status: order.status,
            payment_status: order.payment_status,
            subtotal: order.subtotal,
            tax_amount: order.tax_amount,
            shipping_amount: order.shipping_amount,
            discount_amount: order.discount_amount,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address.clone(),
            notes: order.notes.clone(),
            created_at: now,
            items: Vec::new(),
        };
        state.orders.push(row.clone());
        Ok(row)
    }

    async fn insert_order_items(
        &self,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, BackendError> {
        let mut state = self.begin("insert_order_items")?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            if !state.orders.iter().any(|o| o.id == item.order_id) {
                return Err(foreign_key_violation("order does not exist"));
            }
            if item.quantity < 1 {
                return Err(check_violation("order item quantity must be at least 1"));
            }
            rows.push(OrderItem {
                id: OrderItemId::generate(),
                order_id: item.order_id,
                product_id: Some(item.product_id),
                variant_id: item.variant_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
            });
        }
        state.order_items.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, BackendError> {
        let state = self.begin("list_orders")?;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.user_id.is_none_or(|u| o.user_id == Some(u)))
            .map(|o| state.order_with_items(o))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, BackendError> {
        let state = self.begin("get_order")?;
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| state.order_with_items(o)))
    }

    async fn update_order(&self, id: OrderId, update: &OrderUpdate) -> Result<Order, BackendError> {
        let mut state = self.begin("update_order")?;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| BackendError::NotFound("order".to_string()))?;
        if let Some(status) = update.status {
            order.status = status;
        }
        if let Some(payment_status) = update.payment_status {
            order.payment_status = payment_status;
        }
        if let Some(notes) = &update.notes {
            order.notes = Some(notes.clone());
        }
        let order = order.clone();
        Ok(state.order_with_items(&order))
    }
}

#[async_trait]
impl WishlistStore for MemoryBackend {
    async fn list_wishlist(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, BackendError> {
        let state = self.begin("list_wishlist")?;
        Ok(state
            .wishlists
            .iter()
            .rev()
            .filter(|(u, _)| *u == user_id)
            .map(|(u, p)| WishlistEntry {
                user_id: *u,
                product_id: *p,
                product: state.product(*p),
            })
            .collect())
    }

    async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        let mut state = self.begin("add_to_wishlist")?;
        state.ensure_product(product_id)?;
        if !state.wishlists.contains(&(user_id, product_id)) {
            state.wishlists.push((user_id, product_id));
        }
        Ok(())
    }

    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, BackendError> {
        let mut state = self.begin("remove_from_wishlist")?;
        let before = state.wishlists.len();
        state.wishlists.retain(|entry| *entry != (user_id, product_id));
        Ok(state.wishlists.len() != before)
    }

    async fn is_wishlisted(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, BackendError> {
        let state = self.begin("is_wishlisted")?;
        Ok(state.wishlists.contains(&(user_id, product_id)))
    }
}

#[async_trait]
impl InteractionStore for MemoryBackend {
    async fn list_interactions(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<InteractionType>, BackendError> {
        let state = self.begin("list_interactions")?;
        Ok(state
            .interactions
            .iter()
            .filter(|(u, p, _)| *u == user_id && *p == product_id)
            .map(|(_, _, kind)| *kind)
            .collect())
    }

    async fn record_interaction(
        &self,
        user_id: UserId,
        product_id: ProductId,
        kind: InteractionType,
    ) -> Result<bool, BackendError> {
        let mut state = self.begin("record_interaction")?;
        state.ensure_product(product_id)?;
        let row = (user_id, product_id, kind);
        if state.interactions.contains(&row) {
            return Ok(false);
        }
        state.interactions.push(row);
        Ok(true)
    }

    async fn remove_interaction(
        &self,
        user_id: UserId,
        product_id: ProductId,
        kind: InteractionType,
    ) -> Result<bool, BackendError> {
        let mut state = self.begin("remove_interaction")?;
        let before = state.interactions.len();
        state
            .interactions
            .retain(|row| *row != (user_id, product_id, kind));
        Ok(state.interactions.len() != before)
    }
}

#[async_trait]
impl DataClient for MemoryBackend {
    fn for_user(&self, access_token: &str) -> Arc<dyn DataClient> {
        let viewer = self
            .state()
            .access_tokens
            .get(access_token)
            .copied()
            .map_or(Viewer::Anonymous, Viewer::User);
        Arc::new(Self {
            inner: Arc::clone(&self.inner),
            viewer,
        })
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        self.begin("health_check").map(|_| ())
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

const MEMORY_PUBLIC_PREFIX: &str = "memory://product-images/";

/// Object storage held in memory. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<StorageState>>,
}

#[derive(Default)]
struct StorageState {
    objects: BTreeMap<String, (Vec<u8>, String)>,
    calls: usize,
    fail_uploads: bool,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StorageState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every later upload fail.
    pub fn fail_uploads(&self) {
        self.state().fail_uploads = true;
    }

    /// Paths of every stored object.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    /// Bytes and content type of one object.
    #[must_use]
    pub fn object(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.state().objects.get(path).cloned()
    }

    /// Number of storage calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state().calls
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls += 1;
        if state.fail_uploads {
            return Err(injected("upload"));
        }
        if state.objects.contains_key(path) {
            return Err(BackendError::Conflict(format!("object {path} exists")));
        }
        state
            .objects
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls += 1;
        state.objects.remove(path);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{MEMORY_PUBLIC_PREFIX}{path}")
    }

    fn render_url(&self, src: &str, width: u32, quality: u8) -> Option<String> {
        let path = src.strip_prefix(MEMORY_PUBLIC_PREFIX)?;
        Some(format!(
            "memory://render/product-images/{path}?width={width}&quality={quality}"
        ))
    }

    fn for_user(&self, _access_token: &str) -> Arc<dyn ObjectStorage> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn price(cents: i64) -> Price {
        Price::from_cents(cents).unwrap()
    }

    #[tokio::test]
    async fn test_analytics_upsert_increments_one_counter() {
        let backend = MemoryBackend::new();
        let product = backend.seed_product("Fern Mug", price(1800));

        backend
            .update_product_analytics(product.id, AnalyticsMetric::Views, 1)
            .await
            .unwrap();
        backend
            .update_product_analytics(product.id, AnalyticsMetric::Views, 1)
            .await
            .unwrap();

        let rows = backend.analytics_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].views, 2);
        assert_eq!(rows[0].likes, 0);
        assert_eq!(rows[0].cart_adds, 0);
        assert_eq!(rows[0].purchases, 0);
    }

    #[tokio::test]
    async fn test_order_numbers_come_from_sequence() {
        let backend = MemoryBackend::new();
        let new_order = NewOrder {
            user_id: UserId::generate(),
            status: fernleaf_core::OrderStatus::Pending,
            payment_status: fernleaf_core::PaymentStatus::Pending,
            subtotal: price(100),
            tax_amount: Price::ZERO,
            shipping_amount: Price::ZERO,
            discount_amount: Price::ZERO,
            total_amount: price(100),
            shipping_address: None,
            notes: None,
        };
        let first = backend.create_order(&new_order).await.unwrap();
        let second = backend.create_order(&new_order).await.unwrap();
        assert!(first.order_number.as_str().ends_with("-000001"));
        assert!(second.order_number.as_str().ends_with("-000002"));
    }

    #[tokio::test]
    async fn test_one_cart_per_user() {
        let backend = MemoryBackend::new();
        let user = UserId::generate();
        backend.create_cart(user).await.unwrap();
        let err = backend.create_cart(user).await.unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_injected_failure_and_recovery() {
        let backend = MemoryBackend::new();
        backend.fail("list_categories");
        assert!(backend.list_categories(false).await.is_err());
        backend.recover("list_categories");
        assert!(backend.list_categories(false).await.unwrap().is_empty());
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let backend = MemoryBackend::new();
        let email = Email::parse("ada@fernleaf.shop").unwrap();
        backend
            .sign_up(&email, &SecretString::from("correct horse"), None)
            .await
            .unwrap();

        let err = backend
            .sign_in(&email, &SecretString::from("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized));

        let grant = backend
            .sign_in(&email, &SecretString::from("correct horse"))
            .await
            .unwrap();
        let user = backend.get_user(&grant.tokens.access_token).await.unwrap();
        assert_eq!(user.id, grant.user.id);
    }

    #[tokio::test]
    async fn test_profile_reads_follow_owner_or_admin_policy() {
        let backend = MemoryBackend::new();
        let password = SecretString::from("correct horse");
        let ada = backend
            .sign_up(&Email::parse("ada@fernleaf.shop").unwrap(), &password, None)
            .await
            .unwrap();
        let bo = backend
            .sign_up(&Email::parse("bo@fernleaf.shop").unwrap(), &password, None)
            .await
            .unwrap();
        backend.set_admin(ada.user.id, true);
        backend.set_admin(bo.user.id, false);

        let anonymous = backend.anonymous();
        assert!(anonymous.get_profile(ada.user.id).await.unwrap().is_none());

        let as_bo = backend.for_user(&bo.tokens.unwrap().access_token);
        assert!(as_bo.get_profile(bo.user.id).await.unwrap().is_some());
        assert!(as_bo.get_profile(ada.user.id).await.unwrap().is_none());

        let as_ada = anonymous.for_user(&ada.tokens.unwrap().access_token);
        assert!(as_ada.get_profile(bo.user.id).await.unwrap().is_some());

        assert!(backend.for_user("bogus").get_profile(bo.user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_product_cascades() {
        let backend = MemoryBackend::new();
        let product = backend.seed_product("Vase", price(4200));
        let user = UserId::generate();
        backend.add_to_wishlist(user, product.id).await.unwrap();
        backend
            .update_product_analytics(product.id, AnalyticsMetric::Likes, 1)
            .await
            .unwrap();

        assert!(backend.delete_product(product.id).await.unwrap());
        assert!(backend.list_wishlist(user).await.unwrap().is_empty());
        assert!(backend.analytics_rows().is_empty());
    }

    #[tokio::test]
    async fn test_analytics_range_filter() {
        let backend = MemoryBackend::new();
        let product = backend.seed_product("Bowl", price(2000));
        backend
            .update_product_analytics(product.id, AnalyticsMetric::Shares, 3)
            .await
            .unwrap();
        let today = Utc::now().date_naive();
        let rows = backend
            .list_product_analytics(&AnalyticsRange {
                from: today,
                to: today,
                product_id: None,
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let past = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let rows = backend
            .list_product_analytics(&AnalyticsRange {
                from: past,
                to: past,
                product_id: None,
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
