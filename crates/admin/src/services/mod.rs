//! Admin services.
//!
//! - `reports` - Analytics reports and the dashboard summary

pub mod reports;
