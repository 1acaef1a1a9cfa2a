use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::{
    paginate, ListPage, ListRequest, ObjectMeta, ObjectStore, ObjectStoreError, PresignOp,
    PresignedUrl, UrlSigner,
};

/// Local filesystem object store for development and testing.
///
/// Keys are stored flat: each object is one file under `objects/` named by
/// the SHA-256 of its key, so `docs/` and `docs/a.txt` are siblings on disk
/// exactly as they are in a real bucket and key length never meets the
/// filesystem's name limit. The key itself lives in the sidecar under `meta/`.
pub struct LocalStore {
    objects_path: PathBuf,
    meta_path: PathBuf,
    signer: Option<Arc<UrlSigner>>,
}

/// Per-object attributes the filesystem cannot carry.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    key: String,
    content_type: Option<String>,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref();
        let objects_path = base_path.join("objects");
        let meta_path = base_path.join("meta");
        std::fs::create_dir_all(&objects_path)?;
        std::fs::create_dir_all(&meta_path)?;
        Ok(Self {
            objects_path,
            meta_path,
            signer: None,
        })
    }

    /// Enable presigning; URLs resolve to this process's `/blob` route.
    pub fn with_signer(mut self, signer: Arc<UrlSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        Ok(self.objects_path.join(file_name(key)?))
    }

    fn sidecar_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        Ok(self.meta_path.join(file_name(key)?))
    }

    async fn write_sidecar(&self, sidecar: &Sidecar) -> Result<(), ObjectStoreError> {
        let encoded = rmp_serde::to_vec_named(sidecar)
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;
        tokio::fs::write(self.sidecar_path(&sidecar.key)?, encoded).await?;
        Ok(())
    }

    /// `None` when the key has no sidecar, i.e. the object does not exist.
    async fn read_sidecar(&self, key: &str) -> Result<Option<Sidecar>, ObjectStoreError> {
        match tokio::fs::read(self.sidecar_path(key)?).await {
            Ok(data) => decode_sidecar(&data).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All keys currently stored, in lexicographic order.
    async fn sorted_keys(&self) -> Result<Vec<String>, ObjectStoreError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.meta_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            match tokio::fs::read(entry.path()).await {
                Ok(data) => keys.push(decode_sidecar(&data)?.key),
                // Deleted while we were scanning.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        // Bytes first: an object becomes visible once its sidecar exists.
        tokio::fs::write(self.object_path(key)?, &data).await?;
        self.write_sidecar(&Sidecar {
            key: key.to_string(),
            content_type: Some(content_type.to_string()),
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        match tokio::fs::read(self.object_path(key)?).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let metadata = match tokio::fs::metadata(self.object_path(key)?).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let sidecar = self
            .read_sidecar(key)
            .await?
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size: metadata.len(),
            last_modified: metadata.modified().map(DateTime::<Utc>::from)?,
            content_type: sidecar.content_type,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        for path in [self.sidecar_path(key)?, self.object_path(key)?] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Vec<(String, Result<(), ObjectStoreError>)> {
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            outcomes.push((key.clone(), self.delete(key).await));
        }
        outcomes
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<(), ObjectStoreError> {
        let sidecar = self
            .read_sidecar(source)
            .await?
            .ok_or_else(|| ObjectStoreError::NotFound(source.to_string()))?;

        match tokio::fs::copy(self.object_path(source)?, self.object_path(dest)?).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(source.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        self.write_sidecar(&Sidecar {
            key: dest.to_string(),
            content_type: sidecar.content_type,
        })
        .await
    }

    async fn list(&self, request: &ListRequest) -> Result<ListPage, ObjectStoreError> {
        let page = paginate(self.sorted_keys().await?, request);

        let mut objects = Vec::with_capacity(page.keys.len());
        for key in &page.keys {
            match self.head(key).await {
                Ok(meta) => objects.push(meta),
                // Removed between the directory scan and the stat.
                Err(ObjectStoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(ListPage {
            common_prefixes: page.common_prefixes,
            objects,
            next_continuation: page.next_continuation,
        })
    }

    async fn presign(
        &self,
        op: &PresignOp,
        key: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, ObjectStoreError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            ObjectStoreError::Unsupported("local store has no URL signer configured".to_string())
        })?;
        let ttl = chrono::Duration::from_std(expires_in)
            .map_err(|e| ObjectStoreError::Backend(format!("Invalid expiry: {e}")))?;

        // The URL carries whole seconds, so the reported expiry does too.
        let expires_at = (Utc::now() + ttl).trunc_subsecs(0);
        Ok(PresignedUrl {
            url: signer.sign(op, key, expires_at),
            expires_at,
        })
    }
}

/// On-disk name for `key`: hex SHA-256, a fixed 64 bytes whatever the key length.
fn file_name(key: &str) -> Result<String, ObjectStoreError> {
    if key.is_empty() {
        return Err(ObjectStoreError::Backend(
            "object key must not be empty".to_string(),
        ));
    }
    let digest = ring::digest::digest(&ring::digest::SHA256, key.as_bytes());
    Ok(hex::encode(digest.as_ref()))
}

fn decode_sidecar(data: &[u8]) -> Result<Sidecar, ObjectStoreError> {
    rmp_serde::from_slice(data)
        .map_err(|e| ObjectStoreError::Backend(format!("Corrupt object metadata: {e}")))
}
