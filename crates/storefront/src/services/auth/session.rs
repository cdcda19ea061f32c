//! Who is signed in, and whether they are an admin.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use fernleaf_core::UserId;

use crate::backend::AuthEvent;
use crate::backend::prelude::*;
use crate::error::add_breadcrumb;
use crate::models::AuthUser;

use super::AuthService;

/// The auth context for one visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    pub user: Option<AuthUser>,
    pub is_admin: bool,
    pub is_loading: bool,
}

impl AuthSession {
    /// Before [`AuthSession::initialize`] has run.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            user: None,
            is_admin: false,
            is_loading: true,
        }
    }

    /// Resolve the user behind `access_token` and their admin flag.
    ///
    /// An invalid or missing token leaves the session signed out.
    pub async fn initialize(
        &mut self,
        auth: &dyn AuthClient,
        data: &dyn DataClient,
        access_token: Option<&str>,
    ) {
        self.user = None;
        self.is_admin = false;

        if let Some(token) = access_token {
            match AuthService::new(auth, data).current_user(token).await {
                Ok(user) => {
                    let scoped = data.for_user(token);
                    self.is_admin = check_admin_status(scoped.as_ref(), user.id).await;
                    self.user = Some(user);
                }
                Err(e) => debug!(error = %e, "Access token not accepted"),
            }
        }

        self.is_loading = false;
    }

    /// Re-derive the session from an auth state change.
    ///
    /// The admin flag is read through a client scoped to the event's access
    /// token, since profile rows are only visible to their owner.
    pub async fn apply_event(&mut self, event: &AuthEvent, data: &dyn DataClient) {
        match event.signed_in() {
            Some(signed_in) => {
                let scoped = data.for_user(signed_in.access_token.expose_secret());
                self.is_admin = check_admin_status(scoped.as_ref(), signed_in.user.id).await;
                self.user = Some(signed_in.user.clone());
            }
            None => {
                self.user = None;
                self.is_admin = false;
            }
        }
        self.is_loading = false;
    }
}

/// Whether the user's profile has the admin flag.
///
/// A missing profile or any error counts as not an admin.
pub async fn check_admin_status(data: &dyn DataClient, user_id: UserId) -> bool {
    match data.get_profile(user_id).await {
        Ok(Some(profile)) => profile.is_admin,
        Ok(None) => false,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Admin check failed; treating as non-admin");
            false
        }
    }
}

/// Process-wide listener for auth state changes.
///
/// Follows every event the auth client publishes for the life of the
/// process, keeping the latest [`AuthSession`] and leaving a Sentry
/// breadcrumb per event.
pub struct SessionHolder {
    current: watch::Receiver<AuthSession>,
}

impl SessionHolder {
    /// Subscribe to `auth` and start following events.
    #[must_use]
    pub fn spawn(auth: &dyn AuthClient, data: Arc<dyn DataClient>) -> Self {
        let mut events = auth.subscribe();
        let (tx, current) = watch::channel(AuthSession::default());

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let mut next = tx.borrow().clone();
                        next.apply_event(&event, data.as_ref()).await;
                        let label = event_label(&event);
                        info!(
                            event = label,
                            user_id = ?next.user.as_ref().map(|u| u.id),
                            is_admin = next.is_admin,
                            "Auth state changed"
                        );
                        add_breadcrumb("auth", label, None);
                        tx.send_replace(next);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Auth event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { current }
    }

    /// The latest session.
    #[must_use]
    pub fn current(&self) -> AuthSession {
        self.current.borrow().clone()
    }

    /// Watch for session changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthSession> {
        self.current.clone()
    }
}

const fn event_label(event: &AuthEvent) -> &'static str {
    match event {
        AuthEvent::SignedIn(_) => "signed_in",
        AuthEvent::SignedOut => "signed_out",
        AuthEvent::TokenRefreshed(_) => "token_refreshed",
        AuthEvent::UserUpdated(_) => "user_updated",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fernleaf_core::Email;
    use secrecy::SecretString;

    use crate::backend::SignedInUser;

    use super::*;
    use crate::backend::MemoryBackend;

    async fn signed_up(backend: &MemoryBackend) -> (AuthUser, String) {
        let email = Email::parse("ada@fernleaf.shop").unwrap();
        let signup = backend
            .sign_up(&email, &SecretString::from("correct horse battery"), None)
            .await
            .unwrap();
        (signup.user, signup.tokens.unwrap().access_token)
    }

    #[tokio::test]
    async fn test_no_profile_means_not_admin() {
        let backend = MemoryBackend::new();
        assert!(!check_admin_status(&backend, UserId::generate()).await);
    }

    #[tokio::test]
    async fn test_admin_check_fails_closed() {
        let backend = MemoryBackend::new();
        let user = UserId::generate();
        backend.set_admin(user, true);
        assert!(check_admin_status(&backend, user).await);

        backend.fail("get_profile");
        assert!(!check_admin_status(&backend, user).await);
    }

    #[tokio::test]
    async fn test_initialize_resolves_user_and_admin() {
        let backend = MemoryBackend::new();
        let (user, token) = signed_up(&backend).await;
        backend.set_admin(user.id, true);

        let mut session = AuthSession::loading();
        session.initialize(&backend, &backend, Some(&token)).await;
        assert_eq!(session.user.as_ref().map(|u| u.id), Some(user.id));
        assert!(session.is_admin);
        assert!(!session.is_loading);

        session.initialize(&backend, &backend, Some("bogus")).await;
        assert!(session.user.is_none());
        assert!(!session.is_admin);
    }

    #[tokio::test]
    async fn test_sign_in_event_reads_admin_flag_as_the_user() {
        let backend = MemoryBackend::new();
        let (user, token) = signed_up(&backend).await;
        backend.set_admin(user.id, true);

        // The anonymous client cannot see the profile row at all.
        let anonymous = backend.anonymous();
        assert!(!check_admin_status(&anonymous, user.id).await);

        let mut session = AuthSession::loading();
        let event = AuthEvent::SignedIn(SignedInUser::new(user.clone(), &token));
        session.apply_event(&event, &anonymous).await;
        assert_eq!(session.user.as_ref().map(|u| u.id), Some(user.id));
        assert!(session.is_admin);

        session.apply_event(&AuthEvent::SignedOut, &anonymous).await;
        assert!(session.user.is_none());
        assert!(!session.is_admin);
    }

    #[tokio::test]
    async fn test_holder_marks_admin_through_anonymous_client() {
        let backend = MemoryBackend::new();
        let holder = SessionHolder::spawn(&backend, Arc::new(backend.anonymous()));
        let mut watch = holder.watch();

        let email = Email::parse("ada@fernleaf.shop").unwrap();
        let password = SecretString::from("correct horse battery");
        let signup = backend.sign_up(&email, &password, None).await.unwrap();
        watch.changed().await.unwrap();
        assert!(!holder.current().is_admin);

        backend.set_admin(signup.user.id, true);
        backend.sign_in(&email, &password).await.unwrap();
        watch.changed().await.unwrap();
        let session = holder.current();
        assert_eq!(session.user.map(|u| u.id), Some(signup.user.id));
        assert!(session.is_admin);
    }

    #[tokio::test]
    async fn test_holder_follows_events() {
        let backend = MemoryBackend::new();
        let holder = SessionHolder::spawn(&backend, Arc::new(backend.clone()));
        let mut watch = holder.watch();

        let (user, token) = signed_up(&backend).await;
        watch.changed().await.unwrap();
        assert_eq!(holder.current().user.map(|u| u.id), Some(user.id));

        backend.sign_out(&token).await.unwrap();
        watch.changed().await.unwrap();
        assert!(holder.current().user.is_none());
    }
}
