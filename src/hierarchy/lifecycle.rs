use bytes::Bytes;
use futures::stream::{self, StreamExt};

use super::models::MutationOutcome;
use super::paths;
use super::{Hierarchy, HierarchyError};
use crate::object_store::ObjectStoreError;

const FOLDER_CONTENT_TYPE: &str = "application/x-directory";

impl Hierarchy {
    /// Write the zero-length marker for `scope + name + "/"`.
    ///
    /// Writing an existing marker again simply overwrites it.
    pub async fn create_folder(&self, scope: &str, name: &str) -> Result<String, HierarchyError> {
        let scope = paths::normalize_scope(scope).map_err(HierarchyError::invalid)?;
        paths::validate_name(name).map_err(HierarchyError::invalid)?;

        let key = paths::folder_key(&scope, name);
        self.store
            .put(&key, Bytes::new(), FOLDER_CONTENT_TYPE)
            .await?;

        tracing::debug!(folder_key = %key, "Created folder");
        Ok(key)
    }

    /// Move every object under `old_prefix` to the same relative key under
    /// `new_prefix`, one copy-then-delete pair per object.
    ///
    /// Pairs run concurrently and independently: a failed object does not
    /// stop or undo its siblings. Re-invoking after a partial failure moves
    /// whatever is still left under `old_prefix`.
    pub async fn rename_folder(
        &self,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<MutationOutcome, HierarchyError> {
        check_folder_prefix(old_prefix)?;
        check_folder_prefix(new_prefix)?;
        if old_prefix == new_prefix {
            return Err(HierarchyError::invalid(
                "new folder must differ from the old one",
            ));
        }
        if new_prefix.starts_with(old_prefix) {
            return Err(HierarchyError::invalid(format!(
                "cannot move folder '{old_prefix}' inside itself"
            )));
        }

        let moves: Vec<(String, String)> = self
            .enumerate(old_prefix)
            .await?
            .into_iter()
            .map(|o| {
                let dest = paths::rebase(&o.key, old_prefix, new_prefix);
                (o.key, dest)
            })
            .collect();

        let mut results: Vec<(usize, String, Result<(), ObjectStoreError>)> =
            stream::iter(moves.into_iter().enumerate())
                .map(|(index, (source, dest))| async move {
                    let result = self.move_object(&source, &dest).await;
                    (index, source, result)
                })
                .buffer_unordered(self.config.mutation_concurrency.max(1))
                .collect()
                .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut outcome = MutationOutcome::default();
        for (_, key, result) in results {
            outcome.record(key, result);
        }

        log_outcome("rename", old_prefix, &outcome);
        Ok(outcome)
    }

    /// Remove every object under `prefix` using the store's batched delete.
    ///
    /// A prefix with nothing under it is a successful no-op, so retries are safe.
    pub async fn delete_folder(&self, prefix: &str) -> Result<MutationOutcome, HierarchyError> {
        check_folder_prefix(prefix)?;

        let keys: Vec<String> = self
            .enumerate(prefix)
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect();

        let mut outcome = MutationOutcome::default();
        if keys.is_empty() {
            tracing::debug!(prefix, "Delete of empty folder is a no-op");
            return Ok(outcome);
        }

        let chunks: Vec<Vec<String>> = keys
            .chunks(self.store.max_delete_batch().max(1))
            .map(<[String]>::to_vec)
            .collect();
        let batches: Vec<Vec<(String, Result<(), ObjectStoreError>)>> = stream::iter(chunks)
            .map(|batch| async move { self.store.delete_many(&batch).await })
            .buffered(self.config.mutation_concurrency.max(1))
            .collect()
            .await;

        for (key, result) in batches.into_iter().flatten() {
            outcome.record(key, result);
        }

        log_outcome("delete", prefix, &outcome);
        Ok(outcome)
    }

    /// Rename a single file.
    ///
    /// A failed copy leaves the store untouched and is returned as an error;
    /// a failed delete after a successful copy leaves both keys in place and
    /// is reported as a failed outcome.
    pub async fn rename_file(
        &self,
        old_key: &str,
        new_key: &str,
    ) -> Result<MutationOutcome, HierarchyError> {
        check_file_key(old_key)?;
        check_file_key(new_key)?;
        if old_key == new_key {
            return Err(HierarchyError::invalid("new key must differ from the old one"));
        }

        self.store.copy(old_key, new_key).await?;

        let mut outcome = MutationOutcome::default();
        let removed = self.store.delete(old_key).await.map_err(|e| {
            format!("copied to '{new_key}' but the original could not be removed: {e}")
        });
        outcome.record(old_key.to_string(), removed);

        log_outcome("rename", old_key, &outcome);
        Ok(outcome)
    }

    pub async fn delete_file(&self, key: &str) -> Result<(), HierarchyError> {
        check_file_key(key)?;
        self.store.delete(key).await?;
        tracing::debug!(key, "Deleted file");
        Ok(())
    }

    async fn move_object(&self, source: &str, dest: &str) -> Result<(), ObjectStoreError> {
        self.store.copy(source, dest).await?;
        self.store.delete(source).await
    }
}

fn check_folder_prefix(prefix: &str) -> Result<(), HierarchyError> {
    if !paths::is_folder_prefix(prefix) {
        return Err(HierarchyError::invalid(format!(
            "folder key '{prefix}' must be non-empty and end with '/'"
        )));
    }
    match paths::normalize_scope(prefix) {
        Ok(normalized) if normalized == prefix => Ok(()),
        Ok(_) => Err(HierarchyError::invalid(format!(
            "folder key '{prefix}' is not in canonical form"
        ))),
        Err(e) => Err(HierarchyError::invalid(e)),
    }
}

pub(super) fn check_file_key(key: &str) -> Result<(), HierarchyError> {
    if key.is_empty() {
        return Err(HierarchyError::invalid("file key must not be empty"));
    }
    if paths::is_folder_prefix(key) {
        return Err(HierarchyError::invalid(format!(
            "file key '{key}' must not end with '/'"
        )));
    }
    if key.split(paths::DELIMITER).any(str::is_empty) {
        return Err(HierarchyError::invalid(format!(
            "file key '{key}' contains an empty segment"
        )));
    }
    Ok(())
}

fn log_outcome(action: &str, subject: &str, outcome: &MutationOutcome) {
    for failure in &outcome.failed {
        tracing::warn!(
            action,
            subject,
            key = %failure.key,
            error = %failure.error,
            "Object mutation failed"
        );
    }
    tracing::debug!(
        action,
        subject,
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        "Mutation finished"
    );
}
