//! REST data client for `/rest/v1`.
//!
//! Table reads and writes use PostgREST query syntax (`column=eq.value`,
//! `select=*,relation(*)`, `Prefer: return=representation`). Anonymous catalog
//! reads are cached for one minute; any catalog write through a client that
//! shares the cache clears it.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use fernleaf_core::{
    AnalyticsMetric, CartId, CategoryId, InteractionType, MediaId, OrderId, ProductId, Slug,
    UserId,
};

use super::cache::{CacheKey, CacheValue};
use super::{
    AnalyticsStore, BackendError, parse_body, read_body, CartStore, CatalogStore, DataClient, InteractionStore,
    MediaStore, OrderStore, ProfileStore, WishlistStore,
};
use crate::config::BackendConfig;
use crate::models::{
    AnalyticsRange, CartItemRow, Category, CategoryInput, NewCartItem, NewMedia, NewOrder,
    NewOrderItem, NewProduct, NewProfile, Order, OrderFilter, OrderItem, OrderUpdate, Product,
    ProductAnalytics, ProductMedia, ProductQuery, ProductSort, ProductUpdate, ProfileUpdate,
    ServerCart, UserProfile, WishlistEntry,
};

const PRODUCT_SELECT: &str = "*,product_media(*),product_variants(*)";
const ORDER_SELECT: &str = "*,order_items(*)";
const CART_ITEM_SELECT: &str = "*,products(*,product_media(*))";
const WISHLIST_SELECT: &str = "user_id,product_id,products(*,product_media(*))";

type Params = Vec<(&'static str, String)>;

// =============================================================================
// RestClient
// =============================================================================

/// Client for the backend's REST data API.
///
/// Cheap to clone. A client built with [`RestClient::new`] acts as the
/// anonymous role; [`DataClient::for_user`] returns one that forwards a user's
/// access token.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
    access_token: Option<Arc<SecretString>>,
}

struct RestClientInner {
    http: reqwest::Client,
    rest_url: Url,
    anon_key: SecretString,
    cache: Cache<CacheKey, CacheValue>,
}

impl RestClient {
    /// Create a new anonymous client.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL cannot be joined with the API path
    /// or the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(60))
            .build();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            inner: Arc::new(RestClientInner {
                http,
                rest_url: config.url.join("rest/v1/")?,
                anon_key: config.anon_key.clone(),
                cache,
            }),
            access_token: None,
        })
    }

    fn is_anonymous(&self) -> bool {
        self.access_token.is_none()
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BackendError> {
        let url = self.inner.rest_url.join(path)?;
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(&self.inner.anon_key)
            .expose_secret();

        Ok(self
            .inner
            .http
            .request(method, url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(bearer))
    }

    fn select(&self, table: &str, params: &Params) -> Result<RequestBuilder, BackendError> {
        Ok(self.request(Method::GET, table)?.query(params))
    }

    fn insert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
        params: &Params,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .request(Method::POST, table)?
            .query(params)
            .header("Prefer", "return=representation")
            .json(body))
    }

    fn update<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
        params: &Params,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .request(Method::PATCH, table)?
            .query(params)
            .header("Prefer", "return=representation")
            .json(body))
    }

    fn delete(&self, table: &str, params: &Params) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .request(Method::DELETE, table)?
            .query(params)
            .header("Prefer", "return=representation"))
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        read_body(request.send().await?).await
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        parse_body(&self.send(request).await?)
    }

    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, BackendError> {
        let rows: Vec<T> = self.fetch(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_one<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, BackendError> {
        self.fetch_optional(request)
            .await?
            .ok_or_else(|| BackendError::NotFound(what.to_string()))
    }

    async fn fetch_affected(&self, request: RequestBuilder) -> Result<bool, BackendError> {
        let rows: Vec<serde_json::Value> = self.fetch(request).await?;
        Ok(!rows.is_empty())
    }

    fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }
}

// =============================================================================
// Query building
// =============================================================================

fn eq(value: impl Display) -> String {
    format!("eq.{value}")
}

/// PostgREST `or` filter matching `term` in the name or description.
///
/// Characters that are part of the filter grammar are dropped from the term.
fn search_filter(term: &str) -> Option<String> {
    let cleaned: String = term
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '"' | '\\' | '*' | '%'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Some(format!(
        "(name.ilike.*{cleaned}*,description.ilike.*{cleaned}*)"
    ))
}

const fn order_clause(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Newest => "created_at.desc",
        ProductSort::PriceAsc => "price.asc",
        ProductSort::PriceDesc => "price.desc",
        ProductSort::Name => "name.asc",
        ProductSort::Featured => "is_featured.desc,created_at.desc",
    }
}

fn product_params(query: &ProductQuery) -> Params {
    let mut select = PRODUCT_SELECT.to_string();
    let mut params: Params = Vec::new();

    if let Some(slug) = &query.category {
        select.push_str(",categories!inner(slug)");
        params.push(("categories.slug", eq(slug)));
    }
    params.push(("select", select));

    if !query.include_inactive {
        params.push(("is_active", eq(true)));
    }
    if let Some(id) = query.category_id {
        params.push(("category_id", eq(id)));
    }
    if let Some(min) = query.min_price {
        params.push(("price", format!("gte.{}", min.amount())));
    }
    if let Some(max) = query.max_price {
        params.push(("price", format!("lte.{}", max.amount())));
    }
    if let Some(featured) = query.featured {
        params.push(("is_featured", eq(featured)));
    }
    if query.in_stock {
        params.push(("stock_count", "gt.0".to_string()));
    }
    if let Some(filter) = query.search_term().and_then(search_filter) {
        params.push(("or", filter));
    }

    params.push(("order", order_clause(query.sort).to_string()));
    params.push(("limit", query.limit().to_string()));
    params.push(("offset", query.offset().to_string()));
    params
}

fn sorted_media(mut products: Vec<Product>) -> Vec<Product> {
    for product in &mut products {
        product.sort_media();
    }
    products
}

#[derive(Deserialize)]
struct InteractionRow {
    interaction_type: InteractionType,
}

// =============================================================================
// Store implementations
// =============================================================================

#[async_trait]
impl ProfileStore for RestClient {
    #[instrument(skip(self))]
    async fn get_profile(&self, id: UserId) -> Result<Option<UserProfile>, BackendError> {
        let params = vec![("id", eq(id)), ("limit", "1".to_string())];
        self.fetch_optional(self.select("user_profiles", &params)?)
            .await
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    async fn create_profile(&self, profile: &NewProfile) -> Result<UserProfile, BackendError> {
        self.fetch_one(
            self.insert("user_profiles", profile, &Vec::new())?,
            "created profile",
        )
        .await
    }

    #[instrument(skip(self, update))]
    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, BackendError> {
        let params = vec![("id", eq(id))];
        self.fetch_one(self.update("user_profiles", update, &params)?, "profile")
            .await
    }
}

#[async_trait]
impl CatalogStore for RestClient {
    #[instrument(skip(self))]
    async fn list_categories(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<Category>, BackendError> {
        let cacheable = self.is_anonymous() && !include_inactive;
        if cacheable
            && let Some(CacheValue::Categories(categories)) =
                self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let mut params = vec![("order", "sort_order.asc,name.asc".to_string())];
        if !include_inactive {
            params.push(("is_active", eq(true)));
        }
        let categories: Vec<Category> = self.fetch(self.select("categories", &params)?).await?;

        if cacheable {
            self.inner
                .cache
                .insert(
                    CacheKey::Categories,
                    CacheValue::Categories(categories.clone()),
                )
                .await;
        }
        Ok(categories)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_category(&self, input: &CategoryInput) -> Result<Category, BackendError> {
        let category = self
            .fetch_one(self.insert("categories", input, &Vec::new())?, "created category")
            .await?;
        self.invalidate_catalog();
        Ok(category)
    }

    #[instrument(skip(self, input))]
    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, BackendError> {
        let params = vec![("id", eq(id))];
        let category = self
            .fetch_one(self.update("categories", input, &params)?, "category")
            .await?;
        self.invalidate_catalog();
        Ok(category)
    }

    #[instrument(skip(self))]
    async fn delete_category(&self, id: CategoryId) -> Result<bool, BackendError> {
        let params = vec![("id", eq(id))];
        let deleted = self
            .fetch_affected(self.delete("categories", &params)?)
            .await?;
        self.invalidate_catalog();
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, BackendError> {
        let products = self
            .fetch(self.select("products", &product_params(query))?)
            .await?;
        Ok(sorted_media(products))
    }

    #[instrument(skip(self))]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        let params = vec![
            ("select", PRODUCT_SELECT.to_string()),
            ("id", eq(id)),
            ("limit", "1".to_string()),
        ];
        let product: Option<Product> = self
            .fetch_optional(self.select("products", &params)?)
            .await?;
        Ok(product.map(|mut p| {
            p.sort_media();
            p
        }))
    }

    #[instrument(skip(self), fields(slug = %slug))]
    async fn get_product_by_slug(&self, slug: &Slug) -> Result<Option<Product>, BackendError> {
        let key = CacheKey::ProductBySlug(slug.clone());
        if self.is_anonymous()
            && let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await
        {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }

        let params = vec![
            ("select", PRODUCT_SELECT.to_string()),
            ("slug", eq(slug)),
            ("limit", "1".to_string()),
        ];
        let product: Option<Product> = self
            .fetch_optional(self.select("products", &params)?)
            .await?;
        let product = product.map(|mut p| {
            p.sort_media();
            p
        });

        if self.is_anonymous()
            && let Some(product) = &product
        {
            self.inner
                .cache
                .insert(key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }
        Ok(product)
    }

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    async fn related_products(
        &self,
        product: &Product,
        limit: u32,
    ) -> Result<Vec<Product>, BackendError> {
        let mut params = vec![
            ("select", PRODUCT_SELECT.to_string()),
            ("is_active", eq(true)),
            ("id", format!("neq.{}", product.id)),
            ("order", order_clause(ProductSort::Newest).to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(category_id) = product.category_id {
            params.push(("category_id", eq(category_id)));
        }
        let products = self.fetch(self.select("products", &params)?).await?;
        Ok(sorted_media(products))
    }

    #[instrument(skip(self, product), fields(slug = %product.slug))]
    async fn create_product(&self, product: &NewProduct) -> Result<Product, BackendError> {
        let params = vec![("select", PRODUCT_SELECT.to_string())];
        let created = self
            .fetch_one(self.insert("products", product, &params)?, "created product")
            .await?;
        self.invalidate_catalog();
        Ok(created)
    }

    #[instrument(skip(self, update))]
    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, BackendError> {
        let params = vec![("select", PRODUCT_SELECT.to_string()), ("id", eq(id))];
        let mut updated: Product = self
            .fetch_one(self.update("products", update, &params)?, "product")
            .await?;
        updated.sort_media();
        self.invalidate_catalog();
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: ProductId) -> Result<bool, BackendError> {
        let params = vec![("id", eq(id))];
        let deleted = self.fetch_affected(self.delete("products", &params)?).await?;
        self.invalidate_catalog();
        Ok(deleted)
    }
}

#[async_trait]
impl MediaStore for RestClient {
    #[instrument(skip(self, media), fields(product_id = %media.product_id))]
    async fn insert_media(&self, media: &NewMedia) -> Result<ProductMedia, BackendError> {
        let row = self
            .fetch_one(self.insert("product_media", media, &Vec::new())?, "created media")
            .await?;
        self.invalidate_catalog();
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn get_media(&self, id: MediaId) -> Result<Option<ProductMedia>, BackendError> {
        let params = vec![("id", eq(id)), ("limit", "1".to_string())];
        self.fetch_optional(self.select("product_media", &params)?)
            .await
    }

    #[instrument(skip(self))]
    async fn delete_media(&self, id: MediaId) -> Result<bool, BackendError> {
        let params = vec![("id", eq(id))];
        let deleted = self
            .fetch_affected(self.delete("product_media", &params)?)
            .await?;
        self.invalidate_catalog();
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn set_primary_media(
        &self,
        product_id: ProductId,
        media_id: MediaId,
    ) -> Result<(), BackendError> {
        let siblings = vec![("product_id", eq(product_id)), ("id", format!("neq.{media_id}"))];
        self.send(self.update(
            "product_media",
            &serde_json::json!({ "is_primary": false }),
            &siblings,
        )?)
        .await?;

        let target = vec![("product_id", eq(product_id)), ("id", eq(media_id))];
        let updated = self
            .fetch_affected(self.update(
                "product_media",
                &serde_json::json!({ "is_primary": true }),
                &target,
            )?)
            .await?;
        self.invalidate_catalog();

        if updated {
            Ok(())
        } else {
            Err(BackendError::NotFound(format!("media {media_id}")))
        }
    }
}

#[async_trait]
impl CartStore for RestClient {
    #[instrument(skip(self))]
    async fn find_cart(&self, user_id: UserId) -> Result<Option<ServerCart>, BackendError> {
        let params = vec![
            ("select", "id,user_id".to_string()),
            ("user_id", eq(user_id)),
            ("limit", "1".to_string()),
        ];
        self.fetch_optional(self.select("shopping_carts", &params)?)
            .await
    }

    #[instrument(skip(self))]
    async fn create_cart(&self, user_id: UserId) -> Result<ServerCart, BackendError> {
        let params = vec![("select", "id,user_id".to_string())];
        self.fetch_one(
            self.insert(
                "shopping_carts",
                &serde_json::json!({ "user_id": user_id }),
                &params,
            )?,
            "created cart",
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRow>, BackendError> {
        let params = vec![
            ("select", CART_ITEM_SELECT.to_string()),
            ("cart_id", eq(cart_id)),
            ("order", "created_at.asc".to_string()),
        ];
        self.fetch(self.select("cart_items", &params)?).await
    }

    #[instrument(skip(self, item), fields(cart_id = %item.cart_id, product_id = %item.product_id))]
    async fn upsert_cart_item(&self, item: &NewCartItem) -> Result<CartItemRow, BackendError> {
        let request = self
            .request(Method::POST, "cart_items")?
            .query(&[("on_conflict", "cart_id,product_id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(item);
        self.fetch_one(request, "upserted cart item").await
    }

    #[instrument(skip(self))]
    async fn update_cart_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), BackendError> {
        let params = vec![("cart_id", eq(cart_id)), ("product_id", eq(product_id))];
        self.send(self.update(
            "cart_items",
            &serde_json::json!({ "quantity": quantity }),
            &params,
        )?)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        let params = vec![("cart_id", eq(cart_id)), ("product_id", eq(product_id))];
        self.send(self.delete("cart_items", &params)?).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_cart_items(&self, cart_id: CartId) -> Result<(), BackendError> {
        let params = vec![("cart_id", eq(cart_id))];
        self.send(self.delete("cart_items", &params)?).await?;
        Ok(())
    }
}

#[async_trait]
impl AnalyticsStore for RestClient {
    #[instrument(skip(self))]
    async fn update_product_analytics(
        &self,
        product_id: ProductId,
        metric: AnalyticsMetric,
        increment: i64,
    ) -> Result<(), BackendError> {
        let body = serde_json::json!({
            "p_product_id": product_id,
            "p_metric": metric.as_str(),
            "p_increment": increment,
        });
        self.send(
            self.request(Method::POST, "rpc/update_product_analytics")?
                .json(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_product_analytics(
        &self,
        range: &AnalyticsRange,
    ) -> Result<Vec<ProductAnalytics>, BackendError> {
        let mut params = vec![
            ("date", format!("gte.{}", range.from)),
            ("date", format!("lte.{}", range.to)),
            ("order", "date.asc".to_string()),
        ];
        if let Some(product_id) = range.product_id {
            params.push(("product_id", eq(product_id)));
        }
        self.fetch(self.select("product_analytics", &params)?).await
    }
}

#[async_trait]
impl OrderStore for RestClient {
    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    async fn create_order(&self, order: &NewOrder) -> Result<Order, BackendError> {
        let params = vec![("select", ORDER_SELECT.to_string())];
        self.fetch_one(self.insert("orders", order, &params)?, "created order")
            .await
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn insert_order_items(
        &self,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, BackendError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch(self.insert("order_items", items, &Vec::new())?)
            .await
    }

    #[instrument(skip(self))]
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, BackendError> {
        let mut params = vec![
            ("select", ORDER_SELECT.to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", filter.limit().to_string()),
            ("offset", filter.offset().to_string()),
        ];
        if let Some(status) = filter.status {
            params.push(("status", eq(status)));
        }
        if let Some(user_id) = filter.user_id {
            params.push(("user_id", eq(user_id)));
        }
        self.fetch(self.select("orders", &params)?).await
    }

    #[instrument(skip(self))]
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, BackendError> {
        let params = vec![
            ("select", ORDER_SELECT.to_string()),
            ("id", eq(id)),
            ("limit", "1".to_string()),
        ];
        self.fetch_optional(self.select("orders", &params)?).await
    }

    #[instrument(skip(self, update))]
    async fn update_order(&self, id: OrderId, update: &OrderUpdate) -> Result<Order, BackendError> {
        let params = vec![("select", ORDER_SELECT.to_string()), ("id", eq(id))];
        self.fetch_one(self.update("orders", update, &params)?, "order")
            .await
    }
}

#[async_trait]
impl WishlistStore for RestClient {
    #[instrument(skip(self))]
    async fn list_wishlist(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, BackendError> {
        let params = vec![
            ("select", WISHLIST_SELECT.to_string()),
            ("user_id", eq(user_id)),
            ("order", "created_at.desc".to_string()),
        ];
        self.fetch(self.select("wishlists", &params)?).await
    }

    #[instrument(skip(self))]
    async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::POST, "wishlists")?
            .query(&[("on_conflict", "user_id,product_id")])
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(&serde_json::json!({ "user_id": user_id, "product_id": product_id }));
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, BackendError> {
        let params = vec![("user_id", eq(user_id)), ("product_id", eq(product_id))];
        self.fetch_affected(self.delete("wishlists", &params)?)
            .await
    }

    #[instrument(skip(self))]
    async fn is_wishlisted(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, BackendError> {
        let params = vec![
            ("select", "product_id".to_string()),
            ("user_id", eq(user_id)),
            ("product_id", eq(product_id)),
            ("limit", "1".to_string()),
        ];
        self.fetch_affected(self.select("wishlists", &params)?)
            .await
    }
}

#[async_trait]
impl InteractionStore for RestClient {
    #[instrument(skip(self))]
    async fn list_interactions(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<InteractionType>, BackendError> {
        let params = vec![
            ("select", "interaction_type".to_string()),
            ("user_id", eq(user_id)),
            ("product_id", eq(product_id)),
        ];
        let rows: Vec<InteractionRow> = self
            .fetch(self.select("user_interactions", &params)?)
            .await?;
        Ok(rows.into_iter().map(|r| r.interaction_type).collect())
    }

    #[instrument(skip(self))]
    async fn record_interaction(
        &self,
        user_id: UserId,
        product_id: ProductId,
        kind: InteractionType,
    ) -> Result<bool, BackendError> {
        let request = self
            .request(Method::POST, "user_interactions")?
            .query(&[("on_conflict", "user_id,product_id,interaction_type")])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&serde_json::json!({
                "user_id": user_id,
                "product_id": product_id,
                "interaction_type": kind,
            }));
        // Ignored duplicates are not returned, so an empty body means the flag
        // was already set.
        self.fetch_affected(request).await
    }

    #[instrument(skip(self))]
    async fn remove_interaction(
        &self,
        user_id: UserId,
        product_id: ProductId,
        kind: InteractionType,
    ) -> Result<bool, BackendError> {
        let params = vec![
            ("user_id", eq(user_id)),
            ("product_id", eq(product_id)),
            ("interaction_type", eq(kind)),
        ];
        self.fetch_affected(self.delete("user_interactions", &params)?)
            .await
    }
}

#[async_trait]
impl DataClient for RestClient {
    fn for_user(&self, access_token: &str) -> Arc<dyn DataClient> {
        Arc::new(Self {
            inner: Arc::clone(&self.inner),
            access_token: Some(Arc::new(SecretString::from(access_token.to_owned()))),
        })
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let params = vec![("select", "id".to_string()), ("limit", "1".to_string())];
        self.send(self.select("categories", &params)?).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fernleaf_core::Price;

    use super::*;

    fn value_of<'a>(params: &'a Params, key: &str) -> Vec<&'a str> {
        params
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_search_filter_strips_grammar_characters() {
        assert_eq!(
            search_filter("fern (mug), blue*").unwrap(),
            "(name.ilike.*fern mug blue*,description.ilike.*fern mug blue*)"
        );
        assert_eq!(search_filter(" ,() "), None);
    }

    #[test]
    fn test_default_product_params() {
        let params = product_params(&ProductQuery::default());
        assert_eq!(value_of(&params, "select"), vec![PRODUCT_SELECT]);
        assert_eq!(value_of(&params, "is_active"), vec!["eq.true"]);
        assert_eq!(value_of(&params, "order"), vec!["created_at.desc"]);
        assert_eq!(value_of(&params, "limit"), vec!["24"]);
        assert_eq!(value_of(&params, "offset"), vec!["0"]);
        assert!(value_of(&params, "or").is_empty());
    }

    #[test]
    fn test_product_params_with_filters() {
        let query = ProductQuery {
            category: Slug::from_name("Kitchen"),
            min_price: Some(Price::from_cents(500).unwrap()),
            max_price: Some(Price::from_cents(2500).unwrap()),
            in_stock: true,
            search: Some("mug".to_string()),
            sort: ProductSort::PriceAsc,
            include_inactive: true,
            ..ProductQuery::default()
        };
        let params = product_params(&query);
        assert_eq!(
            value_of(&params, "select"),
            vec!["*,product_media(*),product_variants(*),categories!inner(slug)"]
        );
        assert_eq!(value_of(&params, "categories.slug"), vec!["eq.kitchen"]);
        assert_eq!(value_of(&params, "price"), vec!["gte.5.00", "lte.25.00"]);
        assert_eq!(value_of(&params, "stock_count"), vec!["gt.0"]);
        assert_eq!(value_of(&params, "order"), vec!["price.asc"]);
        assert!(value_of(&params, "is_active").is_empty());
        assert_eq!(value_of(&params, "or").len(), 1);
    }

    #[test]
    fn test_rest_url_and_user_scoping() {
        let config = BackendConfig::for_tests("http://127.0.0.1:54321");
        let anon = RestClient::new(&config).unwrap();
        assert!(anon.is_anonymous());
        assert_eq!(
            anon.inner.rest_url.as_str(),
            "http://127.0.0.1:54321/rest/v1/"
        );

        let scoped = RestClient {
            inner: Arc::clone(&anon.inner),
            access_token: Some(Arc::new(SecretString::from("user-jwt".to_owned()))),
        };
        assert!(!scoped.is_anonymous());
        assert!(Arc::ptr_eq(&anon.inner, &scoped.inner));
    }
}
