//! Row types for the backend tables and the values kept in the session.
//!
//! Field names follow the column names so rows deserialize straight from the
//! REST API. Nested relations (`product_media`, `order_items`, ...) are
//! accepted under their table name and serialized under a shorter one.

pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod profile;
pub mod session;
pub mod wishlist;

pub use analytics::{AnalyticsRange, ProductAnalytics};
pub use cart::{CartItemRow, NewCartItem, ServerCart};
pub use catalog::{
    Category, CategoryInput, NewMedia, NewProduct, Product, ProductMedia, ProductQuery,
    ProductSort, ProductUpdate, ProductVariant,
};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, OrderUpdate, ShippingAddress,
};
pub use profile::{NewProfile, ProfileUpdate, UserProfile};
pub use session::{AuthUser, SessionTokens, StoredAuth, session_keys};
pub use wishlist::{InteractionFlags, WishlistEntry};
