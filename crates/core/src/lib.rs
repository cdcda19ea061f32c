//! Fernleaf Core - Shared types library.
//!
//! This crate provides common types used across all Fernleaf components:
//! - `storefront` - Customer-facing storefront API (feed, search, cart, wishlist, profile)
//! - `admin` - Admin dashboard API (products, orders, analytics)
//! - `cli` - Command-line tools for migrations and admin grants
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, order numbers, slugs and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
