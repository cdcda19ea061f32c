//! Admin authentication extractor.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tracing::warn;

use fernleaf_storefront::middleware::{AuthRejection, BackendState, CurrentUser, RequireAuth};
use fernleaf_storefront::services::auth::check_admin_status;

/// Extractor that requires a signed-in user whose profile has `is_admin`.
///
/// The flag is re-read on every request, so revoking it takes effect
/// immediately.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAdmin(admin): RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {}!", admin.id())
/// }
/// ```
pub struct RequireAdmin(pub CurrentUser);

/// Error returned when a request needs an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRejection {
    /// Nobody is signed in, or the session expired.
    Unauthenticated(AuthRejection),
    /// Signed in, but not an admin.
    Forbidden,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated(rejection) => rejection.into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": "Admin access required" })),
            )
                .into_response(),
        }
    }
}

impl<S: BackendState> FromRequestParts<S> for RequireAdmin {
    type Rejection = AdminRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state)
            .await
            .map_err(AdminRejection::Unauthenticated)?;

        if !check_admin_status(user.data.as_ref(), user.id()).await {
            warn!(user_id = %user.id(), path = %parts.uri.path(), "Non-admin refused");
            return Err(AdminRejection::Forbidden);
        }

        Ok(Self(user))
    }
}
