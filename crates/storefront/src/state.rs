//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::prelude::*;
use crate::backend::{AuthApi, BackendError, RestClient, StorageApi};
use crate::config::{BackendConfig, StorefrontConfig};
use crate::images::{HttpProbe, ImageProbe, ImageResolver, RetryPolicy};
use crate::middleware::BackendState;
use crate::services::auth::SessionHolder;
use crate::services::outbox::Outbox;

/// Error connecting the backend collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend client: {0}")]
    Backend(#[from] BackendError),
    #[error("image probe client: {0}")]
    Probe(#[from] reqwest::Error),
}

/// The external collaborators a server talks to.
#[derive(Clone)]
pub struct Backends {
    pub auth: Arc<dyn AuthClient>,
    pub data: Arc<dyn DataClient>,
    pub storage: Arc<dyn ObjectStorage>,
    pub probe: Arc<dyn ImageProbe>,
}

impl Backends {
    /// HTTP clients for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if an HTTP client cannot be built.
    pub fn connect(config: &BackendConfig) -> Result<Self, StateError> {
        Ok(Self {
            auth: Arc::new(AuthApi::new(config)?),
            data: Arc::new(RestClient::new(config)?),
            storage: Arc::new(StorageApi::new(config)?),
            probe: Arc::new(HttpProbe::new()?),
        })
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the backend collaborators, the side-effect outbox and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backends: Backends,
    outbox: Outbox,
    images: ImageResolver,
    /// Logs each auth state change with the user's admin flag.
    _sessions: SessionHolder,
}

impl AppState {
    /// Create the application state and start its background tasks (the
    /// outbox worker and the auth event listener).
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: StorefrontConfig, backends: Backends) -> Self {
        let outbox = Outbox::spawn();
        let sessions = SessionHolder::spawn(backends.auth.as_ref(), Arc::clone(&backends.data));
        let images = ImageResolver::new(
            Arc::clone(&backends.storage),
            Arc::clone(&backends.probe),
            RetryPolicy::default(),
            config.image_fallback_url.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backends,
                outbox,
                images,
                _sessions: sessions,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn auth(&self) -> &dyn AuthClient {
        self.inner.backends.auth.as_ref()
    }

    /// Backend client acting as the anonymous visitor.
    #[must_use]
    pub fn data(&self) -> &Arc<dyn DataClient> {
        &self.inner.backends.data
    }

    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.inner.outbox
    }

    #[must_use]
    pub fn images(&self) -> &ImageResolver {
        &self.inner.images
    }
}

impl BackendState for AppState {
    fn auth_client(&self) -> &dyn AuthClient {
        self.auth()
    }

    fn data_client(&self) -> &Arc<dyn DataClient> {
        self.data()
    }
}
