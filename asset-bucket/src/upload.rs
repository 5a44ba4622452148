#![doc = "HTTP object-store client: the concrete `AssetStore` used by the CLI."]
//
//! # Asset store client (CLI <-> Core)
//!
//! Bridges the [`AssetStore`] contract from `asset-bucket-core` to an object
//! store reachable over HTTP.
//!
//! - Objects are written with `PUT {endpoint}/{bucket}/{key}` where the key is
//!   `{key_prefix}/{namespace}/{file name}`.
//! - Requests carry `Authorization: Bearer <secret key>`, `x-access-key` and an
//!   `x-content-sha256` hex digest of the body.
//! - Any 2xx answer means the object is served at `{domain}/{key}`.
//! - Every key segment is percent-encoded in both URLs.
//!
//! One attempt per upload; the request timeout comes from [`StoreConfig`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use sha2::{Digest, Sha256};

use asset_bucket_core::contract::{AssetStore, StoreError};

use crate::load_config::StoreConfig;

pub struct HttpAssetStore {
    client: reqwest::Client,
    config: StoreConfig,
}

impl HttpAssetStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                StoreError::Transport(e.to_string())
            })?;
        tracing::info!(
            bucket = %config.bucket,
            endpoint = %config.endpoint,
            "Initialized HttpAssetStore"
        );
        Ok(Self { client, config })
    }

    /// Path segments of the object for `file_name` under `namespace`:
    /// the key prefix (which may itself contain `/`), the namespace and the file name.
    pub fn key_segments<'s>(&'s self, namespace: &'s str, file_name: &'s str) -> Vec<&'s str> {
        self.config
            .key_prefix
            .split('/')
            .chain([namespace, file_name])
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    /// Object key for `file_name` uploaded under `namespace`, unencoded.
    pub fn object_key(&self, namespace: &str, file_name: &str) -> String {
        self.key_segments(namespace, file_name).join("/")
    }

    /// Public URL the object for `file_name` under `namespace` is served from.
    /// Each segment is percent-encoded, so `fig#1.png` becomes `fig%231.png`.
    pub fn public_url(&self, namespace: &str, file_name: &str) -> Result<String, StoreError> {
        let domain = self.config.domain.trim_end_matches('/');
        let base = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };
        let url = with_segments(&base, &self.key_segments(namespace, file_name))?;
        Ok(url.to_string())
    }

    fn upload_url(&self, namespace: &str, file_name: &str) -> Result<Url, StoreError> {
        let mut segments = vec![self.config.bucket.as_str()];
        segments.extend(self.key_segments(namespace, file_name));
        with_segments(&self.config.endpoint, &segments)
    }
}

/// Append `segments` to the path of `base`, percent-encoding each one.
fn with_segments(base: &str, segments: &[&str]) -> Result<Url, StoreError> {
    let invalid = |reason: String| StoreError::InvalidUrl {
        url: base.to_string(),
        reason,
    };
    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn upload(&self, local_file: &Path, namespace: &str) -> Result<String, StoreError> {
        let file_name = local_file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StoreError::InvalidPath(local_file.display().to_string()))?;

        let content = std::fs::read(local_file).map_err(|source| {
            tracing::error!(file = %local_file.display(), error = ?source, "Failed to read asset");
            StoreError::Io {
                path: local_file.display().to_string(),
                source,
            }
        })?;

        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(&content);
            format!("{:x}", hasher.finalize())
        };
        let content_type = mime_guess::from_path(local_file).first_or_octet_stream();
        let key = self.object_key(namespace, file_name);
        let upload_url = self.upload_url(namespace, file_name)?;
        let public_url = self.public_url(namespace, file_name)?;

        tracing::info!(
            key = %key,
            bucket = %self.config.bucket,
            size = content.len(),
            "Uploading asset"
        );

        let response = self
            .client
            .put(upload_url)
            .bearer_auth(&self.config.secret_key)
            .header("x-access-key", &self.config.access_key)
            .header("x-content-sha256", &content_hash)
            .header(CONTENT_TYPE, content_type.as_ref())
            .body(content)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, key = %key, "Transport error uploading asset");
                StoreError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, key = %key, "Store rejected upload");
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(url = %public_url, "Successfully uploaded asset");
        Ok(public_url)
    }
}
