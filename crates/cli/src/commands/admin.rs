//! Admin flag management.
//!
//! # Usage
//!
//! ```bash
//! fl-cli admin grant --email owner@fernleaf.shop
//! fl-cli admin revoke --email owner@fernleaf.shop
//! ```
//!
//! The account must already exist (signed up through the storefront). A
//! missing profile row is created from the auth user.

use fernleaf_core::{Email, EmailError};
use thiserror::Error;
use uuid::Uuid;

use super::migrate::{MigrationError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] MigrationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No account found for {0}")]
    UserNotFound(String),
}

/// Grant the admin flag.
///
/// # Errors
///
/// Returns an error for an invalid email, an unknown account or a database
/// failure.
pub async fn grant(email: &str) -> Result<Uuid, AdminError> {
    set_admin(email, true).await
}

/// Revoke the admin flag.
///
/// # Errors
///
/// Returns an error for an invalid email, an unknown account or a database
/// failure.
pub async fn revoke(email: &str) -> Result<Uuid, AdminError> {
    set_admin(email, false).await
}

async fn set_admin(email: &str, is_admin: bool) -> Result<Uuid, AdminError> {
    let email = Email::parse(email)?;
    let pool = connect().await?;

    let updated: Option<Uuid> = sqlx::query_scalar(
        r"
        UPDATE user_profiles SET is_admin = $2
        WHERE LOWER(email) = LOWER($1)
        RETURNING id
        ",
    )
    .bind(email.as_str())
    .bind(is_admin)
    .fetch_optional(&pool)
    .await?;

    let user_id = match updated {
        Some(id) => id,
        None => sqlx::query_scalar(
            r"
            INSERT INTO user_profiles (id, email, is_admin)
            SELECT id, email, $2 FROM auth.users WHERE LOWER(email) = LOWER($1)
            ON CONFLICT (id) DO UPDATE SET is_admin = EXCLUDED.is_admin
            RETURNING id
            ",
        )
        .bind(email.as_str())
        .bind(is_admin)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?,
    };

    tracing::info!(
        user_id = %user_id,
        email = %email,
        is_admin,
        "Admin flag updated"
    );
    Ok(user_id)
}
