//! Application state shared across handlers.

use std::sync::Arc;

use fernleaf_storefront::backend::prelude::*;
use fernleaf_storefront::middleware::BackendState;
use fernleaf_storefront::state::Backends;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The admin server holds the same anon-key
/// clients as the storefront; every write goes out scoped to the signed-in
/// admin so the backend's admin policies apply.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    backends: Backends,
}

impl AppState {
    #[must_use]
    pub fn new(config: AdminConfig, backends: Backends) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, backends }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn auth(&self) -> &dyn AuthClient {
        self.inner.backends.auth.as_ref()
    }

    #[must_use]
    pub fn data(&self) -> &Arc<dyn DataClient> {
        &self.inner.backends.data
    }

    /// Object storage for product images.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.inner.backends.storage
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
