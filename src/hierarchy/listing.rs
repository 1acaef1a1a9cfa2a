use super::models::{FileEntry, FolderEntry, Listing, SearchResults};
use super::paths;
use super::{Hierarchy, HierarchyError};
use crate::object_store::ListRequest;

impl Hierarchy {
    /// One level of the tree under `scope`: sub-folders from common prefixes,
    /// files from the objects stored directly at this level.
    pub async fn list(&self, scope: &str) -> Result<Listing, HierarchyError> {
        let scope = paths::normalize_scope(scope).map_err(HierarchyError::invalid)?;

        let mut request = ListRequest::level(scope.as_str());
        let mut folders = Vec::new();
        let mut files = Vec::new();

        loop {
            let page = self.store.list(&request).await?;

            folders.extend(page.common_prefixes.into_iter().filter_map(|prefix| {
                let name = prefix
                    .strip_prefix(scope.as_str())?
                    .strip_suffix(paths::DELIMITER)?
                    .to_string();
                Some(FolderEntry { name, prefix })
            }));

            // The scope's own marker and sub-folder markers are not files.
            files.extend(
                page.objects
                    .into_iter()
                    .filter(|o| o.key != scope && !paths::is_folder_prefix(&o.key))
                    .map(FileEntry::from),
            );

            match page.next_continuation {
                Some(token) => request.continuation = Some(token),
                None => break,
            }
        }

        let breadcrumbs = paths::breadcrumbs(&scope);
        let parent = (!breadcrumbs.is_empty()).then(|| paths::parent_scope(&breadcrumbs));

        Ok(Listing {
            scope,
            breadcrumbs,
            parent,
            folders,
            files,
        })
    }

    /// Case-insensitive substring match over at most `search_window` keys.
    pub async fn search(&self, query: &str) -> Result<SearchResults, HierarchyError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(HierarchyError::invalid("search query must not be empty"));
        }
        let needle = query.to_lowercase();
        let window = self.config.search_window;

        let mut request = ListRequest::recursive("");
        let mut scanned = 0usize;
        let mut files = Vec::new();
        let mut truncated = false;

        while scanned < window {
            request.max_keys = Some(window - scanned);
            let page = self.store.list(&request).await?;
            if page.objects.is_empty() && page.next_continuation.is_none() {
                break;
            }

            scanned += page.objects.len();
            files.extend(
                page.objects
                    .into_iter()
                    .filter(|o| o.key.to_lowercase().contains(&needle))
                    .map(FileEntry::from),
            );

            match page.next_continuation {
                Some(_) if scanned >= window => truncated = true,
                Some(token) => request.continuation = Some(token),
                None => break,
            }
        }

        tracing::debug!(query, hits = files.len(), scanned, truncated, "Searched keys");

        Ok(SearchResults {
            query: query.to_string(),
            files,
            truncated,
        })
    }
}
