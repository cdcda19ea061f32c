//! Categories, products, media and variants.

use chrono::{DateTime, Utc};
use fernleaf_core::{CategoryId, MediaId, Price, ProductId, Slug, VariantId};
use serde::{Deserialize, Serialize};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Admin input for creating or replacing a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<Slug>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// An image or video attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMedia {
    pub id: MediaId,
    pub product_id: ProductId,
    pub url: String,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default = "default_media_type")]
    pub media_type: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_primary: bool,
}

/// A media row to insert after an upload.
#[derive(Debug, Clone, Serialize)]
pub struct NewMedia {
    pub product_id: ProductId,
    pub url: String,
    pub storage_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    pub media_type: String,
    pub sort_order: i32,
    pub is_primary: bool,
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    /// Overrides the product price when set.
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub stock_count: i32,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// A product with its media and variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: Slug,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub compare_price: Option<Price>,
    #[serde(default)]
    pub stock_count: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, alias = "product_media")]
    pub media: Vec<ProductMedia>,
    #[serde(default, alias = "product_variants")]
    pub variants: Vec<ProductVariant>,
}

impl Product {
    /// The thumbnail: the primary media row, else the first by sort order.
    #[must_use]
    pub fn primary_image(&self) -> Option<&ProductMedia> {
        self.media
            .iter()
            .find(|m| m.is_primary)
            .or_else(|| self.media.iter().min_by_key(|m| m.sort_order))
    }

    /// Whether any stock is left.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_count > 0
    }

    /// Whether the product shows a struck-through compare price.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.compare_price.is_some_and(|compare| compare > self.price)
    }

    /// Look up a variant by id.
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Sort media by `sort_order` in place.
    pub fn sort_media(&mut self) {
        self.media.sort_by_key(|m| m.sort_order);
    }
}

/// Admin input for a new product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: Slug,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_price: Option<Price>,
    #[serde(default)]
    pub stock_count: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update of a product; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<Slug>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ProductUpdate {
    /// Apply the set fields to a product.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(slug) = &self.slug {
            product.slug = slug.clone();
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(compare_price) = self.compare_price {
            product.compare_price = Some(compare_price);
        }
        if let Some(stock_count) = self.stock_count {
            product.stock_count = stock_count;
        }
        if let Some(is_active) = self.is_active {
            product.is_active = is_active;
        }
        if let Some(is_featured) = self.is_featured {
            product.is_featured = is_featured;
        }
        if let Some(category_id) = self.category_id {
            product.category_id = Some(category_id);
        }
        if let Some(tags) = &self.tags {
            product.tags.clone_from(tags);
        }
    }
}

/// Product feed ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Featured,
}

/// Filters, ordering and paging for the product feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,
    pub category: Option<Slug>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub featured: Option<bool>,
    pub in_stock: bool,
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub sort: ProductSort,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Admin listings include inactive products.
    #[serde(skip)]
    pub include_inactive: bool,
}

impl ProductQuery {
    pub const DEFAULT_LIMIT: u32 = 24;
    pub const MAX_LIMIT: u32 = 100;

    /// Page size, clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// The trimmed search term, if any is left after trimming.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether a product passes every filter (not paging or ordering).
    #[must_use]
    pub fn matches(&self, product: &Product, category_slug: Option<&Slug>) -> bool {
        if !self.include_inactive && !product.is_active {
            return false;
        }
        if self.category_id.is_some() && product.category_id != self.category_id {
            return false;
        }
        if let Some(wanted) = &self.category
            && category_slug != Some(wanted)
        {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price < min)
            || self.max_price.is_some_and(|max| product.price > max)
        {
            return false;
        }
        if self.featured.is_some_and(|f| product.is_featured != f) {
            return false;
        }
        if self.in_stock && !product.in_stock() {
            return false;
        }
        if let Some(term) = self.search_term() {
            let term = term.to_lowercase();
            let in_name = product.name.to_lowercase().contains(&term);
            let in_description = product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term));
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }

    /// Order products in place according to `sort`.
    pub fn sort_products(&self, products: &mut [Product]) {
        match self.sort {
            ProductSort::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProductSort::PriceAsc => products.sort_by(|a, b| a.price.cmp(&b.price)),
            ProductSort::PriceDesc => products.sort_by(|a, b| b.price.cmp(&a.price)),
            ProductSort::Name => products.sort_by(|a, b| a.name.cmp(&b.name)),
            ProductSort::Featured => products.sort_by(|a, b| {
                b.is_featured
                    .cmp(&a.is_featured)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_media_type() -> String {
    "image".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(name: &str, cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::generate(),
            name: name.to_string(),
            slug: Slug::from_name(name).unwrap(),
            description: Some("Hand-thrown stoneware".to_string()),
            price: Price::from_cents(cents).unwrap(),
            compare_price: None,
            stock_count: 3,
            is_active: true,
            is_featured: false,
            category_id: None,
            tags: vec![],
            created_at: now,
            updated_at: now,
            media: vec![],
            variants: vec![],
        }
    }

    #[test]
    fn test_product_deserializes_nested_relations() {
        let json = serde_json::json!({
            "id": "6f1c2a4e-8d9b-4c3a-9e1f-0a2b3c4d5e6f",
            "name": "Fern Mug",
            "slug": "fern-mug",
            "price": 18.5,
            "created_at": "2026-03-01T10:00:00Z",
            "updated_at": "2026-03-01T10:00:00Z",
            "product_media": [{
                "id": "0b7a4c52-1f0e-4a57-9d35-8a9b3e2f4c61",
                "product_id": "6f1c2a4e-8d9b-4c3a-9e1f-0a2b3c4d5e6f",
                "url": "https://cdn.example/mug.jpg",
                "sort_order": 0,
                "is_primary": true
            }]
        });
        let product: Product = serde_json::from_value(json).unwrap();
        assert_eq!(product.media.len(), 1);
        assert!(product.variants.is_empty());
        assert!(product.is_active);
        assert_eq!(product.primary_image().unwrap().url, "https://cdn.example/mug.jpg");
    }

    #[test]
    fn test_primary_image_falls_back_to_lowest_sort_order() {
        let mut p = product("Mug", 1000);
        for (i, url) in ["b.jpg", "a.jpg"].iter().enumerate() {
            p.media.push(ProductMedia {
                id: MediaId::generate(),
                product_id: p.id,
                url: (*url).to_string(),
                storage_path: None,
                alt_text: None,
                media_type: "image".to_string(),
                sort_order: 1 - i32::try_from(i).unwrap(),
                is_primary: false,
            });
        }
        assert_eq!(p.primary_image().unwrap().url, "a.jpg");
    }

    #[test]
    fn test_query_filters_search_and_price() {
        let query = ProductQuery {
            search: Some("  STONEWARE ".to_string()),
            max_price: Some(Price::from_cents(1500).unwrap()),
            ..ProductQuery::default()
        };
        assert!(query.matches(&product("Bowl", 1200), None));
        assert!(!query.matches(&product("Vase", 2400), None));

        let mut inactive = product("Plate", 900);
        inactive.is_active = false;
        assert!(!query.matches(&inactive, None));
    }

    #[test]
    fn test_query_limit_is_clamped() {
        let query = ProductQuery {
            limit: Some(1000),
            ..ProductQuery::default()
        };
        assert_eq!(query.limit(), ProductQuery::MAX_LIMIT);
        assert_eq!(ProductQuery::default().limit(), ProductQuery::DEFAULT_LIMIT);
    }

    #[test]
    fn test_update_applies_only_set_fields() {
        let mut p = product("Mug", 1000);
        ProductUpdate {
            price: Some(Price::from_cents(1200).unwrap()),
            ..ProductUpdate::default()
        }
        .apply_to(&mut p);
        assert_eq!(p.price, Price::from_cents(1200).unwrap());
        assert_eq!(p.name, "Mug");
    }
}
