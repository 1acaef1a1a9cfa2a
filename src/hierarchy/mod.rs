//! Folder-and-file semantics over a flat object store.
//!
//! Folders exist only as key prefixes, optionally pinned by a zero-length
//! marker object whose key ends in `/`. Nothing is cached: every call
//! re-derives its view from the store.

mod capability;
mod lifecycle;
mod listing;
pub mod models;
pub mod paths;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::object_store::{ListRequest, ObjectMeta, ObjectStore, ObjectStoreError};

pub use models::{
    Capability, FileEntry, FileType, FolderEntry, KeyFailure, Listing, MutationOutcome,
    SearchResults,
};

#[derive(Debug, Error)]
pub enum HierarchyError {
    /// Rejected before any store call; retrying will not help.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Store unavailable: {0}")]
    Store(#[from] ObjectStoreError),
}

impl HierarchyError {
    fn invalid(message: impl Into<String>) -> Self {
        HierarchyError::InvalidInput(message.into())
    }
}

#[derive(Debug, Clone)]
pub struct HierarchyConfig {
    /// Maximum keys enumerated by a single search.
    pub search_window: usize,
    /// Maximum in-flight copy/delete pairs during a folder rename.
    pub mutation_concurrency: usize,
    /// Lifetime of issued capability URLs.
    pub capability_ttl: Duration,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            search_window: 1000,
            mutation_concurrency: 8,
            capability_ttl: Duration::from_secs(3600),
        }
    }
}

/// Stateless façade over an object store; cheap to clone per request.
#[derive(Clone)]
pub struct Hierarchy {
    store: Arc<dyn ObjectStore>,
    config: HierarchyConfig,
}

impl Hierarchy {
    pub fn new(store: Arc<dyn ObjectStore>, config: HierarchyConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Every object under `prefix`, following continuation tokens to the end.
    async fn enumerate(&self, prefix: &str) -> Result<Vec<ObjectMeta>, ObjectStoreError> {
        let mut request = ListRequest::recursive(prefix);
        let mut objects = Vec::new();

        loop {
            let page = self.store.list(&request).await?;
            objects.extend(page.objects);
            match page.next_continuation {
                Some(token) => request.continuation = Some(token),
                None => return Ok(objects),
            }
        }
    }
}
