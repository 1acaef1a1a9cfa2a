mod gcs;
mod local;
mod signing;

pub use gcs::GcsStore;
pub use local::LocalStore;
pub use signing::{SignatureError, SignedParams, UrlSigner};

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Upper bound on keys per batched delete request (S3 and GCS both cap at 1000).
pub const DEFAULT_DELETE_BATCH: usize = 1000;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Metadata for a single stored object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub prefix: String,
    /// When set, keys are rolled up into common prefixes at the first
    /// occurrence of the delimiter after `prefix`.
    pub delimiter: Option<char>,
    pub continuation: Option<String>,
    /// Bounds objects plus common prefixes in one page.
    pub max_keys: Option<usize>,
}

impl ListRequest {
    /// A delimiter-aware request for one level under `prefix`.
    pub fn level(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some('/'),
            ..Default::default()
        }
    }

    /// A recursive request for every key under `prefix`.
    pub fn recursive(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub common_prefixes: Vec<String>,
    pub objects: Vec<ObjectMeta>,
    /// Present exactly when more results follow this page.
    pub next_continuation: Option<String>,
}

/// The operation a presigned URL grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresignOp {
    Get,
    Put { content_type: String },
}

/// A presigned URL and the instant its signature stops being honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Abstraction over flat object storage backends.
///
/// Keys are opaque strings; `/` has no meaning to the store beyond the
/// delimiter roll-up performed by `list`. Listings are returned in
/// lexicographic key order.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str)
        -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError>;
    /// Deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
    /// Delete a batch of keys, reporting one outcome per key in request order.
    async fn delete_many(&self, keys: &[String]) -> Vec<(String, Result<(), ObjectStoreError>)>;
    async fn copy(&self, source: &str, dest: &str) -> Result<(), ObjectStoreError>;
    async fn list(&self, request: &ListRequest) -> Result<ListPage, ObjectStoreError>;
    async fn presign(
        &self,
        op: &PresignOp,
        key: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, ObjectStoreError>;

    fn max_delete_batch(&self) -> usize {
        DEFAULT_DELETE_BATCH
    }
}

/// One page of keys produced by [`paginate`], before object metadata is attached.
#[derive(Debug, Default)]
pub(crate) struct KeyPage {
    pub common_prefixes: Vec<String>,
    pub keys: Vec<String>,
    pub next_continuation: Option<String>,
}

/// Roll a lexicographically sorted key sequence into one listing page.
///
/// Shared by backends that enumerate keys themselves rather than asking a
/// remote service to paginate. The continuation token is the last key or
/// common prefix emitted; the next page resumes strictly after it.
pub(crate) fn paginate<I>(sorted_keys: I, request: &ListRequest) -> KeyPage
where
    I: IntoIterator<Item = String>,
{
    let limit = request.max_keys.unwrap_or(DEFAULT_DELETE_BATCH).max(1);
    let mut page = KeyPage::default();
    let mut emitted = 0usize;
    let mut last_emitted: Option<String> = None;

    for key in sorted_keys {
        let Some(rest) = key.strip_prefix(request.prefix.as_str()) else {
            continue;
        };

        let rolled_up = request
            .delimiter
            .and_then(|d| rest.find(d).map(|i| (d, i)))
            .map(|(d, i)| format!("{}{}", request.prefix, &rest[..i + d.len_utf8()]));

        // Everything up to and including the token has already been returned.
        if let Some(token) = request.continuation.as_deref() {
            let position = rolled_up.as_deref().unwrap_or(key.as_str());
            if position <= token {
                continue;
            }
        }

        if rolled_up.is_some() && page.common_prefixes.last() == rolled_up.as_ref() {
            continue;
        }
        if emitted == limit {
            page.next_continuation = last_emitted;
            return page;
        }
        emitted += 1;

        match rolled_up {
            Some(common) => {
                last_emitted = Some(common.clone());
                page.common_prefixes.push(common);
            }
            None => {
                last_emitted = Some(key.clone());
                page.keys.push(key);
            }
        }
    }

    page
}
