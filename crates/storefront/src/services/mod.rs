//! Storefront services.
//!
//! Plain reads and writes go straight from handlers to the backend traits;
//! these modules hold the flows with rules of their own.
//!
//! - `outbox` - Best-effort side effects run by one background worker
//! - `analytics` - Daily product counters and interaction toggles
//! - `auth` - Sign-up/sign-in/sign-out and the auth session holder
//! - `checkout` - Order totals and order placement

pub mod analytics;
pub mod auth;
pub mod checkout;
pub mod outbox;
