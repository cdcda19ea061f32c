//! Auth service client for `/auth/v1`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::instrument;
use url::Url;

use fernleaf_core::{Email, UserId};

use super::{
    AuthClient, AuthEvent, AuthGrant, BackendError, SignUp, SignedInUser, parse_body, read_body,
};
use crate::config::BackendConfig;
use crate::models::{AuthUser, SessionTokens};

/// Lifetime assumed when the auth service omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Capacity of the auth event channel; slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 64;

/// Client for the backend auth service.
///
/// Successful sign-in, refresh and sign-out calls are published to
/// subscribers as [`AuthEvent`]s.
#[derive(Clone)]
pub struct AuthApi {
    inner: Arc<AuthApiInner>,
}

struct AuthApiInner {
    http: reqwest::Client,
    auth_url: Url,
    anon_key: SecretString,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserBody> for AuthUser {
    fn from(body: UserBody) -> Self {
        Self {
            id: body.id,
            email: body.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserBody,
}

impl SessionBody {
    fn into_grant(self, now: DateTime<Utc>) -> AuthGrant {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(|| {
                now + chrono::Duration::seconds(
                    self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
                )
            });

        AuthGrant {
            user: self.user.into(),
            tokens: SessionTokens {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_at,
            },
        }
    }
}

/// Sign-up returns a session when confirmation is off, a bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(SessionBody),
    User(UserBody),
}

impl AuthApi {
    /// Create a new auth client.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL cannot be joined with the API path
    /// or the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(AuthApiInner {
                http,
                auth_url: config.url.join("auth/v1/")?,
                anon_key: config.anon_key.clone(),
                events,
            }),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<RequestBuilder, BackendError> {
        let url = self.inner.auth_url.join(path)?;
        let anon_key = self.inner.anon_key.expose_secret();
        Ok(self
            .inner
            .http
            .request(method, url)
            .header("apikey", anon_key)
            .bearer_auth(bearer.unwrap_or(anon_key)))
    }

    fn publish(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<AuthGrant, BackendError> {
        let request = self
            .request(Method::POST, "token", None)?
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let session: SessionBody = parse_body(&read_body(request.send().await?).await?)?;
        Ok(session.into_grant(Utc::now()))
    }
}

#[async_trait]
impl AuthClient for AuthApi {
    #[instrument(skip(self, password, full_name), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: Option<&str>,
    ) -> Result<SignUp, BackendError> {
        let body = serde_json::json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "data": { "full_name": full_name },
        });
        let request = self.request(Method::POST, "signup", None)?.json(&body);
        let response: SignUpBody = parse_body(&read_body(request.send().await?).await?)?;

        Ok(match response {
            SignUpBody::Session(session) => {
                let grant = session.into_grant(Utc::now());
                self.publish(AuthEvent::SignedIn(SignedInUser::new(
                    grant.user.clone(),
                    &grant.tokens.access_token,
                )));
                SignUp {
                    user: grant.user,
                    tokens: Some(grant.tokens),
                }
            }
            SignUpBody::User(user) => SignUp {
                user: user.into(),
                tokens: None,
            },
        })
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthGrant, BackendError> {
        let grant = self
            .token_grant(
                "password",
                serde_json::json!({
                    "email": email.as_str(),
                    "password": password.expose_secret(),
                }),
            )
            .await?;
        self.publish(AuthEvent::SignedIn(SignedInUser::new(
            grant.user.clone(),
            &grant.tokens.access_token,
        )));
        Ok(grant)
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let request = self.request(Method::POST, "logout", Some(access_token))?;
        match read_body(request.send().await?).await {
            // An already-invalid token is as signed out as it gets.
            Ok(_) | Err(BackendError::Unauthorized | BackendError::NotFound(_)) => {
                self.publish(AuthEvent::SignedOut);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all)]
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let request = self.request(Method::GET, "user", Some(access_token))?;
        let user: UserBody = parse_body(&read_body(request.send().await?).await?)?;
        Ok(user.into())
    }

    #[instrument(skip_all)]
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthGrant, BackendError> {
        let grant = self
            .token_grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await?;
        self.publish(AuthEvent::TokenRefreshed(SignedInUser::new(
            grant.user.clone(),
            &grant.tokens.access_token,
        )));
        Ok(grant)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const USER_ID: &str = "6f1c2a4e-8d9b-4c3a-9e1f-0a2b3c4d5e6f";

    #[test]
    fn test_sign_up_with_session() {
        let json = format!(
            r#"{{"access_token":"at","token_type":"bearer","expires_in":3600,"expires_at":1767225600,"refresh_token":"rt","user":{{"id":"{USER_ID}","email":"ada@fernleaf.shop"}}}}"#
        );
        let body: SignUpBody = serde_json::from_str(&json).unwrap();
        let SignUpBody::Session(session) = body else {
            panic!("expected a session");
        };
        let grant = session.into_grant(Utc::now());
        assert_eq!(grant.user.email.as_deref(), Some("ada@fernleaf.shop"));
        assert_eq!(grant.tokens.expires_at.timestamp(), 1_767_225_600);
    }

    #[test]
    fn test_sign_up_pending_confirmation() {
        let json = format!(r#"{{"id":"{USER_ID}","email":"ada@fernleaf.shop","confirmation_sent_at":"2026-03-01T10:00:00Z"}}"#);
        let body: SignUpBody = serde_json::from_str(&json).unwrap();
        assert!(matches!(body, SignUpBody::User(_)));
    }

    #[test]
    fn test_expiry_falls_back_to_expires_in() {
        let now = Utc::now();
        let session = SessionBody {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_in: Some(120),
            expires_at: None,
            user: UserBody {
                id: USER_ID.parse().unwrap(),
                email: None,
            },
        };
        let grant = session.into_grant(now);
        assert_eq!(grant.tokens.expires_at, now + chrono::Duration::seconds(120));
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let api = AuthApi::new(&BackendConfig::for_tests("http://127.0.0.1:54321")).unwrap();
        let mut events = api.subscribe();
        api.publish(AuthEvent::SignedOut);
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
    }
}
