//! Object storage client for `/storage/v1`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use super::{BackendError, ObjectStorage, read_body};
use crate::config::BackendConfig;

/// Client for one storage bucket.
#[derive(Clone)]
pub struct StorageApi {
    inner: Arc<StorageApiInner>,
    access_token: Option<Arc<SecretString>>,
}

struct StorageApiInner {
    http: reqwest::Client,
    storage_url: Url,
    anon_key: SecretString,
    bucket: String,
    /// `{storage_url}object/public/{bucket}/`, the prefix of every public URL.
    public_prefix: String,
}

impl StorageApi {
    /// Create a new anonymous storage client for the configured bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL cannot be joined with the API path
    /// or the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let storage_url = config.url.join("storage/v1/")?;
        let public_prefix = format!("{storage_url}object/public/{}/", config.storage_bucket);

        Ok(Self {
            inner: Arc::new(StorageApiInner {
                http,
                storage_url,
                anon_key: config.anon_key.clone(),
                bucket: config.storage_bucket.clone(),
                public_prefix,
            }),
            access_token: None,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, BackendError> {
        let url = self.inner.storage_url.join(path)?;
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(&self.inner.anon_key)
            .expose_secret();
        Ok(self
            .inner
            .http
            .request(method, url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(bearer))
    }
}

#[async_trait]
impl ObjectStorage for StorageApi {
    #[instrument(skip(self, bytes), fields(bucket = %self.inner.bucket, size = bytes.len()))]
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let request = self
            .request(
                Method::POST,
                &format!("object/{}/{path}", self.inner.bucket),
            )?
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("cache-control", "max-age=31536000")
            .header("x-upsert", "false")
            .body(bytes);
        read_body(request.send().await?).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.inner.bucket))]
    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        let request = self
            .request(Method::DELETE, &format!("object/{}", self.inner.bucket))?
            .json(&serde_json::json!({ "prefixes": [path] }));
        read_body(request.send().await?).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.public_prefix)
    }

    fn render_url(&self, src: &str, width: u32, quality: u8) -> Option<String> {
        let path = src.strip_prefix(&self.inner.public_prefix)?;
        Some(format!(
            "{}render/image/public/{}/{path}?width={width}&quality={quality}&resize=contain",
            self.inner.storage_url, self.inner.bucket
        ))
    }

    fn for_user(&self, access_token: &str) -> Arc<dyn ObjectStorage> {
        Arc::new(Self {
            inner: Arc::clone(&self.inner),
            access_token: Some(Arc::new(SecretString::from(access_token.to_owned()))),
        })
    }
}
