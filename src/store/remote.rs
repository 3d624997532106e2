//! Remote object-store settings storage.
//!
//! Speaks plain HTTP GET/PUT against a configured container endpoint
//! with an access-key/secret-key pair; vendor-specific request signing
//! is deliberately out of scope. Fetches download into a local cache
//! directory before the bytes are handed to the caller.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RemoteStoreConfig;
use crate::{AppError, Result};

use super::{parse_json_blob, ConfigStore};

/// Config store backed by a remote object container.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    /// Container base URL, no trailing slash.
    base_url: String,
    /// Bucket label parsed from the endpoint host, for logs only.
    bucket: String,
    access_key: String,
    secret_key: String,
    cache_dir: PathBuf,
}

impl RemoteStore {
    /// Build a remote store from loaded credentials and a cache directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the endpoint URL is empty or the
    /// cache directory cannot be created.
    pub fn new(store: &RemoteStoreConfig, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        if store.endpoint_url.is_empty() {
            return Err(AppError::Config("remote store endpoint is empty".into()));
        }
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)
            .map_err(|err| AppError::Io(format!("cannot create cache dir: {err}")))?;

        let base_url = store.endpoint_url.trim_end_matches('/').to_owned();
        let bucket = bucket_label(&base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|err| AppError::Config(format!("http client: {err}")))?;

        Ok(Self {
            client,
            base_url,
            bucket,
            access_key: store.access_key.clone(),
            secret_key: store.secret_key.clone(),
            cache_dir,
        })
    }

    /// Bucket label derived from the endpoint host, used as log context.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }

    async fn fetch_inner(&self, name: String) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get(self.object_url(&name))
            .basic_auth(&self.access_key, Some(&self.secret_key))
            .send()
            .await
            .map_err(|err| AppError::ConfigUnavailable(format!("{name}: {err}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::ConfigUnavailable(format!(
                "{name}: object store returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| AppError::ConfigUnavailable(format!("{name}: {err}")))?
            .to_vec();

        // Mirror the blob into the cache directory; the cached copy is
        // advisory, so a failed write only warns.
        let cache_path = self.cache_dir.join(&name);
        if let Err(err) = tokio::fs::write(&cache_path, &bytes).await {
            warn!(name, %err, "failed to cache fetched blob");
        } else {
            debug!(name, bucket = self.bucket, "blob cached locally");
        }

        Ok(Some(bytes))
    }

    async fn write_inner(&self, name: String, payload: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .put(self.object_url(&name))
            .basic_auth(&self.access_key, Some(&self.secret_key))
            .body(payload)
            .send()
            .await
            .map_err(|err| AppError::ConfigUnavailable(format!("{name}: {err}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::ConfigUnavailable(format!(
                "{name}: object store returned {}",
                response.status()
            )))
        }
    }
}

impl ConfigStore for RemoteStore {
    fn fetch(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>>> + Send + '_>> {
        let name = name.to_owned();
        Box::pin(async move { self.fetch_inner(name).await })
    }

    fn fetch_json(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<Option<Value>>> + Send + '_>> {
        let name = name.to_owned();
        Box::pin(async move {
            match self.fetch_inner(name.clone()).await? {
                Some(bytes) => parse_json_blob(&name, &bytes).map(Some),
                None => Ok(None),
            }
        })
    }

    fn write_json(&self, name: &str, value: &Value) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let name = name.to_owned();
        let payload = value.to_string().into_bytes();
        Box::pin(async move {
            match self.write_inner(name.clone(), payload).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(name, %err, "remote settings write failed");
                    false
                }
            }
        })
    }
}

/// First label of the endpoint host, mirroring the original
/// `bucket.region.host/container` layout.
fn bucket_label(url: &str) -> String {
    url.split("//")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or_default()
        .split('.')
        .next()
        .unwrap_or_default()
        .to_owned()
}
