//! # contract: interface to the remote object store
//!
//! The migration engine never talks to a network directly. It hands each local
//! asset to an [`AssetStore`], which returns the public URL the document should
//! point at from then on.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; with the default `test-export-mocks`
//!   feature, `MockAssetStore` is available to integration tests and dependents.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

/// Failure of a single upload. Never aborts a document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("store rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid asset path: {0}")]
    InvalidPath(String),
    #[error("invalid store url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Uploads one local file into a namespace of the remote store.
///
/// Implementors own timeouts and authentication. A single call is a single
/// attempt; callers do not retry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload `local_file` under `namespace` and return its public URL.
    async fn upload(&self, local_file: &Path, namespace: &str) -> Result<String, StoreError>;
}
