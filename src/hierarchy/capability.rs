use super::lifecycle::check_file_key;
use super::models::Capability;
use super::{Hierarchy, HierarchyError};
use crate::object_store::PresignOp;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

impl Hierarchy {
    /// A URL that reads `key` until it expires.
    ///
    /// No existence check is made: a URL for a missing key is valid and
    /// fails with not-found only when used.
    pub async fn issue_download(&self, key: &str) -> Result<Capability, HierarchyError> {
        self.issue(&PresignOp::Get, key).await
    }

    /// A URL that writes `key` with the given content type until it expires.
    ///
    /// Without an explicit content type one is guessed from the key's extension.
    pub async fn issue_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<Capability, HierarchyError> {
        // Folder markers are written by create_folder only.
        check_file_key(key)?;

        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .map(str::to_string)
            .or_else(|| mime_guess::from_path(key).first().map(|m| m.to_string()))
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        self.issue(&PresignOp::Put { content_type }, key).await
    }

    async fn issue(&self, op: &PresignOp, key: &str) -> Result<Capability, HierarchyError> {
        if key.is_empty() {
            return Err(HierarchyError::invalid("key must not be empty"));
        }

        let presigned = self
            .store
            .presign(op, key, self.config.capability_ttl)
            .await?;

        tracing::debug!(key, ?op, "Issued capability URL");
        Ok(Capability {
            url: presigned.url,
            key: key.to_string(),
            expires_at: presigned.expires_at,
        })
    }
}
