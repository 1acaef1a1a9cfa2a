use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::paths;
use crate::object_store::ObjectMeta;

/// Classification of a file derived from its MIME type, used to pick a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Audio,
    Binary,
    Document,
    Image,
    Text,
    Video,
}

impl FileType {
    /// Derive a file type classification from a MIME type string.
    pub fn from_mime(mime_type: &str) -> Self {
        let (primary, sub) = mime_type.split_once('/').unwrap_or((mime_type, ""));
        match primary {
            "audio" => FileType::Audio,
            "image" => FileType::Image,
            "video" => FileType::Video,
            "text" => FileType::Text,
            "application" => match sub {
                "json" | "xml" | "javascript" | "x-sh" | "toml" | "yaml" => FileType::Text,
                "pdf"
                | "msword"
                | "rtf"
                | "vnd.openxmlformats-officedocument.wordprocessingml.document"
                | "vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "vnd.openxmlformats-officedocument.presentationml.presentation"
                | "vnd.ms-excel"
                | "vnd.ms-powerpoint" => FileType::Document,
                _ => FileType::Binary,
            },
            _ => FileType::Binary,
        }
    }

    /// Classify by the key's extension; the store's recorded content type is
    /// often a generic `application/octet-stream` for uploaded files.
    pub fn from_key(key: &str) -> Self {
        mime_guess::from_path(key)
            .first()
            .map(|m| FileType::from_mime(m.essence_str()))
            .unwrap_or(FileType::Binary)
    }
}

/// One sub-folder of a listed scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub name: String,
    /// Full scope of this folder; always ends in `/`.
    pub prefix: String,
}

/// One object directly inside a listed scope (or a search hit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub key: String,
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub file_type: FileType,
    /// Scope containing this file.
    pub path: String,
}

impl From<ObjectMeta> for FileEntry {
    fn from(meta: ObjectMeta) -> Self {
        FileEntry {
            name: paths::name_of(&meta.key).to_string(),
            path: paths::parent_path(&meta.key).to_string(),
            file_type: FileType::from_key(&meta.key),
            size: meta.size,
            last_modified: meta.last_modified,
            key: meta.key,
        }
    }
}

/// One level of the hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub scope: String,
    pub breadcrumbs: Vec<String>,
    /// Scope one level up; `None` at the root.
    pub parent: Option<String>,
    pub folders: Vec<FolderEntry>,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub files: Vec<FileEntry>,
    /// More keys existed beyond the enumeration window, so matches may be missing.
    pub truncated: bool,
}

/// A key that could not be moved or removed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFailure {
    pub key: String,
    pub error: String,
}

/// Per-key result of a multi-object rename or delete.
///
/// Both lists follow enumeration order regardless of the order in which
/// concurrent sub-operations completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<KeyFailure>,
}

impl MutationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn record<E: std::fmt::Display>(&mut self, key: String, result: Result<(), E>) {
        match result {
            Ok(()) => self.succeeded.push(key),
            Err(e) => self.failed.push(KeyFailure {
                key,
                error: e.to_string(),
            }),
        }
    }
}

/// A time-limited URL granting one operation on one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub url: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
}
