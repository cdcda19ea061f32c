//! Resolving a displayable image URL.
//!
//! Each image moves `Loading → Loaded(url)` or `Loading → Error(fallback)`.
//! The optimized URL is tried first. After a failure the original URL is
//! retried up to [`RetryPolicy::max_retries`] times with a linear backoff of
//! `attempt × base_delay`; once retries run out the static fallback is used.
//! Failures are never reported to the caller.
//!
//! Only objects in the product image bucket are ever requested. Any other
//! source resolves straight to the fallback, so the server never fetches a
//! URL a visitor chose.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{JPEG_QUALITY, OptimizedUrlCache};
use crate::backend::ObjectStorage;

/// Render state of one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "url", rename_all = "snake_case")]
pub enum ImageState {
    Loading,
    Loaded(String),
    Error(String),
}

/// How often and how slowly to retry the original URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Checks whether an image URL can be loaded.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn is_available(&self, url: &str) -> bool;
}

/// Probes with an HTTP `HEAD` request.
#[derive(Clone)]
pub struct HttpProbe {
    http: reqwest::Client,
}

impl HttpProbe {
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()?,
        })
    }
}

#[async_trait]
impl ImageProbe for HttpProbe {
    async fn is_available(&self, url: &str) -> bool {
        match self.http.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url, error = %e, "Image probe failed");
                false
            }
        }
    }
}

/// The load state machine for one image.
#[derive(Debug, Clone)]
pub struct ImageLoad {
    state: ImageState,
    current: String,
    original: String,
    retries: u32,
    policy: RetryPolicy,
}

impl ImageLoad {
    /// Start loading, with the optimized URL first when there is one.
    #[must_use]
    pub fn new(original: &str, optimized: Option<&str>, policy: RetryPolicy) -> Self {
        Self {
            state: ImageState::Loading,
            current: optimized.unwrap_or(original).to_string(),
            original: original.to_string(),
            retries: 0,
            policy,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ImageState {
        &self.state
    }

    /// The URL to try next.
    #[must_use]
    pub fn current_url(&self) -> &str {
        &self.current
    }

    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// The current URL loaded.
    pub fn on_load(&mut self) {
        self.state = ImageState::Loaded(self.current.clone());
    }

    /// The current URL failed. Returns how long to wait before retrying the
    /// original, or `None` once the fallback has been substituted.
    pub fn on_error(&mut self, fallback: &str) -> Option<Duration> {
        if self.retries < self.policy.max_retries {
            self.retries += 1;
            self.current.clone_from(&self.original);
            Some(self.policy.delay(self.retries))
        } else {
            self.state = ImageState::Error(fallback.to_string());
            None
        }
    }

    /// Drive the machine to a final state using `probe`.
    pub async fn run(mut self, probe: &dyn ImageProbe, fallback: &str) -> ImageState {
        loop {
            if probe.is_available(&self.current).await {
                self.on_load();
                return self.state;
            }
            match self.on_error(fallback) {
                Some(delay) => tokio::time::sleep(delay).await,
                None => return self.state,
            }
        }
    }
}

/// Builds optimized URLs and resolves images to something displayable.
#[derive(Clone)]
pub struct ImageResolver {
    storage: Arc<dyn ObjectStorage>,
    probe: Arc<dyn ImageProbe>,
    cache: OptimizedUrlCache,
    policy: RetryPolicy,
    fallback_url: String,
}

impl ImageResolver {
    pub const DEFAULT_WIDTH: u32 = 800;
    pub const MAX_WIDTH: u32 = 2400;

    #[must_use]
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        probe: Arc<dyn ImageProbe>,
        policy: RetryPolicy,
        fallback_url: String,
    ) -> Self {
        Self {
            storage,
            probe,
            cache: OptimizedUrlCache::new(),
            policy,
            fallback_url,
        }
    }

    #[must_use]
    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    /// The resized rendition of `src`, or `None` when `src` is not an object
    /// in the bucket.
    #[must_use]
    pub fn optimized_url(&self, src: &str, width: u32) -> Option<String> {
        if !is_plain_object_url(src) {
            return None;
        }
        let width = width.clamp(1, Self::MAX_WIDTH);
        self.cache.get_or_insert_with(src, width, || {
            self.storage.render_url(src, width, JPEG_QUALITY)
        })
    }

    /// Resolve `src` to a loaded URL or the fallback.
    #[instrument(skip(self))]
    pub async fn resolve(&self, src: &str, width: Option<u32>) -> ImageState {
        let src = src.trim();
        let Some(optimized) = self.optimized_url(src, width.unwrap_or(Self::DEFAULT_WIDTH))
        else {
            debug!(src, "Not a product image; using fallback");
            return ImageState::Error(self.fallback_url.clone());
        };

        ImageLoad::new(src, Some(&optimized), self.policy)
            .run(self.probe.as_ref(), &self.fallback_url)
            .await
    }
}

/// No query, fragment, backslash or `..` segment that could point the request
/// somewhere other than the object itself.
fn is_plain_object_url(src: &str) -> bool {
    !src.is_empty()
        && !src.contains(['?', '#', '\\'])
        && !src.split('/').any(|segment| segment == ".." || segment == ".")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::backend::MemoryStorage;

    /// Fails every URL in `broken` and records what was probed.
    struct ScriptedProbe {
        broken: Vec<String>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedProbe {
        fn new(broken: &[&str]) -> Self {
            Self {
                broken: broken.iter().map(ToString::to_string).collect(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageProbe for ScriptedProbe {
        async fn is_available(&self, url: &str) -> bool {
            self.seen.lock().unwrap().push(url.to_string());
            !self.broken.iter().any(|b| b == url)
        }
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(3), Duration::from_millis(1500));
    }

    #[test]
    fn test_state_machine_exhausts_retries() {
        let mut load = ImageLoad::new("orig.jpg", Some("opt.jpg"), RetryPolicy::default());
        assert_eq!(load.current_url(), "opt.jpg");
        for attempt in 1..=3u32 {
            assert_eq!(
                load.on_error("fallback.svg"),
                Some(Duration::from_millis(500 * u64::from(attempt)))
            );
            assert_eq!(load.current_url(), "orig.jpg");
        }
        assert_eq!(load.on_error("fallback.svg"), None);
        assert_eq!(load.state(), &ImageState::Error("fallback.svg".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimized_failure_falls_back_to_original() {
        let probe = ScriptedProbe::new(&["opt.jpg"]);
        let state = ImageLoad::new("orig.jpg", Some("opt.jpg"), RetryPolicy::default())
            .run(&probe, "fallback.svg")
            .await;
        assert_eq!(state, ImageState::Loaded("orig.jpg".to_string()));
        assert_eq!(probe.seen(), vec!["opt.jpg", "orig.jpg"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failures_use_fallback() {
        let probe = ScriptedProbe::new(&["opt.jpg", "orig.jpg"]);
        let state = ImageLoad::new("orig.jpg", Some("opt.jpg"), RetryPolicy::default())
            .run(&probe, "fallback.svg")
            .await;
        assert_eq!(state, ImageState::Error("fallback.svg".to_string()));
        assert_eq!(probe.seen().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_uses_render_url_for_bucket_images() {
        let storage = MemoryStorage::new();
        let src = storage.public_url("products/a-0-1.jpg");
        let probe = Arc::new(ScriptedProbe::new(&[]));
        let resolver = ImageResolver::new(
            Arc::new(storage),
            probe.clone(),
            RetryPolicy::default(),
            "/static/placeholder-product.svg".to_string(),
        );

        let state = resolver.resolve(&src, Some(400)).await;
        let ImageState::Loaded(url) = state else {
            panic!("expected loaded, got {state:?}");
        };
        assert!(url.contains("width=400"));

        let empty = resolver.resolve("  ", None).await;
        assert_eq!(
            empty,
            ImageState::Error("/static/placeholder-product.svg".to_string())
        );
    }

    fn build_resolver(storage: MemoryStorage, checker: Arc<ScriptedProbe>) -> ImageResolver {
        ImageResolver::new(
            Arc::new(storage),
            checker,
            RetryPolicy::default(),
            "/static/placeholder-product.svg".to_string(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_sources_are_never_requested() {
        let storage = MemoryStorage::new();
        let inside = storage.public_url("products/a-0-1.jpg");
        let checker = Arc::new(ScriptedProbe::new(&[]));
        let resolver = build_resolver(storage, checker.clone());
        let fallback = ImageState::Error("/static/placeholder-product.svg".to_string());

        let with_query = format!("{inside}?redirect=http://127.0.0.1/");
        let traversal = inside.replace("products/a-0-1.jpg", "../../private/x.jpg");
        for src in [
            "http://127.0.0.1:8080/admin/secret",
            "http://169.254.169.254/latest/meta-data/",
            "https://cdn.other/x.png",
            "file:///etc/passwd",
            with_query.as_str(),
            traversal.as_str(),
        ] {
            assert_eq!(resolver.resolve(src, Some(400)).await, fallback, "{src}");
            assert!(resolver.optimized_url(src, 400).is_none(), "{src}");
        }
        assert!(checker.seen().is_empty());
    }
}
