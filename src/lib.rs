//! object-explorer - A folder-and-file view over flat object storage
//!
//! This crate presents hierarchical navigation over a store that only knows
//! flat keys, with:
//! - Swappable object storage backends (local filesystem, GCS)
//! - Folder listing, creation, recursive rename and delete, key search
//! - Time-limited signed URLs for direct uploads and downloads
//! - REST API with JSend envelopes

pub mod api;
pub mod config;
pub mod hierarchy;
pub mod object_store;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use hierarchy::Hierarchy;
use object_store::{ObjectStore, UrlSigner};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub hierarchy: Hierarchy,
    pub object_store: Arc<dyn ObjectStore>,
    /// Present when capability URLs are served by this process (local backend).
    pub signer: Option<Arc<UrlSigner>>,
}

impl AppState {
    pub fn new(
        config: Config,
        object_store: Arc<dyn ObjectStore>,
        signer: Option<Arc<UrlSigner>>,
    ) -> Self {
        let hierarchy = Hierarchy::new(Arc::clone(&object_store), config.hierarchy());
        Self {
            config,
            hierarchy,
            object_store,
            signer,
        }
    }
}
