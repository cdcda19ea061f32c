//! HTTP middleware for admin.
//!
//! Sessions, request IDs and user resolution come from the storefront crate;
//! this module adds the admin gate on top.

pub mod auth;

pub use auth::{AdminRejection, RequireAdmin};
