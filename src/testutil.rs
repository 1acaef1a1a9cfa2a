//! Shared test helpers for object-explorer unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{CapabilityConfig, Config, LimitsConfig, StorageConfig};
use crate::object_store::{
    ListPage, ListRequest, LocalStore, ObjectMeta, ObjectStore, ObjectStoreError, PresignOp,
    PresignedUrl, UrlSigner,
};
use crate::AppState;

pub const TEST_BASE_URL: &str = "http://files.test";

pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        storage: StorageConfig {
            local_storage_path: temp_dir.path().join("objects").to_string_lossy().to_string(),
            ..Default::default()
        },
        capabilities: CapabilityConfig {
            public_base_url: TEST_BASE_URL.to_string(),
            signing_secret: Some("test-secret".to_string()),
            ttl_seconds: 3600,
        },
        limits: LimitsConfig {
            max_upload_size: 1024 * 1024, // 1MB for tests
            ..Default::default()
        },
    }
}

/// Create a test AppState backed by a signed local store in a temporary directory.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let config = test_config(temp_dir);
    let signer = Arc::new(UrlSigner::new(b"test-secret", TEST_BASE_URL));
    let store = LocalStore::new(&config.storage.local_storage_path)
        .expect("Failed to create test object store")
        .with_signer(Arc::clone(&signer));

    Arc::new(AppState::new(config, Arc::new(store), Some(signer)))
}

/// Wraps a store and fails chosen operations on chosen keys.
pub struct FaultyStore {
    inner: Arc<dyn ObjectStore>,
    pub fail_copy: HashSet<String>,
    pub fail_delete: HashSet<String>,
    /// Forces small pages so callers must follow continuation tokens.
    pub page_size: Option<usize>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            fail_copy: HashSet::new(),
            fail_delete: HashSet::new(),
            page_size: None,
        }
    }

    fn injected(key: &str) -> ObjectStoreError {
        ObjectStoreError::Backend(format!("injected failure for {key}"))
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.inner.get(key).await
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        self.inner.head(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        if self.fail_delete.contains(key) {
            return Err(Self::injected(key));
        }
        self.inner.delete(key).await
    }

    async fn delete_many(&self, keys: &[String]) -> Vec<(String, Result<(), ObjectStoreError>)> {
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            outcomes.push((key.clone(), self.delete(key).await));
        }
        outcomes
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<(), ObjectStoreError> {
        if self.fail_copy.contains(source) {
            return Err(Self::injected(source));
        }
        self.inner.copy(source, dest).await
    }

    async fn list(&self, request: &ListRequest) -> Result<ListPage, ObjectStoreError> {
        let mut request = request.clone();
        if let Some(size) = self.page_size {
            request.max_keys = Some(request.max_keys.map_or(size, |m| m.min(size)));
        }
        self.inner.list(&request).await
    }

    async fn presign(
        &self,
        op: &PresignOp,
        key: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, ObjectStoreError> {
        self.inner.presign(op, key, expires_in).await
    }

    fn max_delete_batch(&self) -> usize {
        // Small batches exercise the chunking path.
        2
    }
}
