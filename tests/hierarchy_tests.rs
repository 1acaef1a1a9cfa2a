use std::sync::Arc;

use bytes::Bytes;
use object_explorer::hierarchy::{FileType, Hierarchy, HierarchyConfig, HierarchyError};
use object_explorer::object_store::{LocalStore, ObjectStore, UrlSigner};

fn setup(config: HierarchyConfig) -> (tempfile::TempDir, Arc<dyn ObjectStore>, Hierarchy) {
    let dir = tempfile::tempdir().unwrap();
    let signer = Arc::new(UrlSigner::new(b"secret", "http://files.test"));
    let store: Arc<dyn ObjectStore> =
        Arc::new(LocalStore::new(dir.path()).unwrap().with_signer(signer));
    let hierarchy = Hierarchy::new(Arc::clone(&store), config);
    (dir, store, hierarchy)
}

fn default_setup() -> (tempfile::TempDir, Arc<dyn ObjectStore>, Hierarchy) {
    setup(HierarchyConfig::default())
}

async fn put(store: &Arc<dyn ObjectStore>, key: &str, body: &str) {
    store
        .put(key, Bytes::from(body.to_string()), "text/plain")
        .await
        .unwrap();
}

fn folder_names(listing: &object_explorer::hierarchy::Listing) -> Vec<&str> {
    listing.folders.iter().map(|f| f.name.as_str()).collect()
}

fn file_keys(listing: &object_explorer::hierarchy::Listing) -> Vec<&str> {
    listing.files.iter().map(|f| f.key.as_str()).collect()
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_empty_store() {
    let (_dir, _store, h) = default_setup();

    let listing = h.list("").await.unwrap();
    assert!(listing.folders.is_empty());
    assert!(listing.files.is_empty());
    assert!(listing.breadcrumbs.is_empty());
    assert_eq!(listing.parent, None);
}

#[tokio::test]
async fn test_list_excludes_markers_from_files() {
    let (_dir, store, h) = default_setup();
    put(&store, "docs/", "").await;
    put(&store, "docs/img/", "").await;
    put(&store, "docs/readme.txt", "hi").await;
    put(&store, "docs/img/logo.png", "png").await;

    let listing = h.list("docs/").await.unwrap();

    assert_eq!(folder_names(&listing), vec!["img"]);
    assert_eq!(listing.folders[0].prefix, "docs/img/");
    assert_eq!(file_keys(&listing), vec!["docs/readme.txt"]);
    for file in &listing.files {
        assert_ne!(file.key, "docs/");
        assert!(!file.key.ends_with('/'));
    }
}

#[tokio::test]
async fn test_list_derives_folders_without_markers() {
    let (_dir, store, h) = default_setup();
    put(&store, "photos/2024/a.jpg", "x").await;

    let listing = h.list("").await.unwrap();
    assert_eq!(folder_names(&listing), vec!["photos"]);
    assert_eq!(listing.folders[0].prefix, "photos/");
}

#[tokio::test]
async fn test_list_file_entry_fields() {
    let (_dir, store, h) = default_setup();
    put(&store, "docs/notes.txt", "hello").await;

    let listing = h.list("docs").await.unwrap();
    assert_eq!(listing.scope, "docs/");
    assert_eq!(listing.breadcrumbs, vec!["docs"]);
    assert_eq!(listing.parent.as_deref(), Some(""));

    let file = &listing.files[0];
    assert_eq!(file.name, "notes.txt");
    assert_eq!(file.size, 5);
    assert_eq!(file.path, "docs/");
    assert_eq!(file.file_type, FileType::Text);
}

#[tokio::test]
async fn test_list_nested_breadcrumbs() {
    let (_dir, _store, h) = default_setup();

    let listing = h.list("a/b/c/").await.unwrap();
    assert_eq!(listing.breadcrumbs, vec!["a", "b", "c"]);
    assert_eq!(listing.parent.as_deref(), Some("a/b/"));
}

#[tokio::test]
async fn test_list_rejects_malformed_scope() {
    let (_dir, _store, h) = default_setup();

    assert!(matches!(
        h.list("a//b/").await,
        Err(HierarchyError::InvalidInput(_))
    ));
    assert!(matches!(
        h.list("/a/").await,
        Err(HierarchyError::InvalidInput(_))
    ));
}

// ============================================================================
// Folder lifecycle
// ============================================================================

#[tokio::test]
async fn test_create_folder_then_list() {
    let (_dir, _store, h) = default_setup();

    let key = h.create_folder("", "x").await.unwrap();
    assert_eq!(key, "x/");

    let listing = h.list("").await.unwrap();
    assert_eq!(folder_names(&listing), vec!["x"]);
    assert_eq!(listing.folders[0].prefix, "x/");

    let nested = h.create_folder("x/", "y").await.unwrap();
    assert_eq!(nested, "x/y/");
    let listing = h.list("x/").await.unwrap();
    assert_eq!(folder_names(&listing), vec!["y"]);
    assert!(listing.files.is_empty());
}

#[tokio::test]
async fn test_create_folder_is_idempotent() {
    let (_dir, _store, h) = default_setup();

    h.create_folder("", "docs").await.unwrap();
    h.create_folder("", "docs").await.unwrap();

    let listing = h.list("").await.unwrap();
    assert_eq!(folder_names(&listing), vec!["docs"]);
}

#[tokio::test]
async fn test_create_folder_rejects_bad_names() {
    let (_dir, store, h) = default_setup();

    for name in ["", "  ", "a/b"] {
        assert!(matches!(
            h.create_folder("", name).await,
            Err(HierarchyError::InvalidInput(_))
        ));
    }
    // Nothing reached the store
    assert!(store
        .list(&object_explorer::object_store::ListRequest::recursive(""))
        .await
        .unwrap()
        .objects
        .is_empty());
}

#[tokio::test]
async fn test_delete_folder_then_list_parent() {
    let (_dir, store, h) = default_setup();
    h.create_folder("", "tmp").await.unwrap();
    put(&store, "tmp/a.txt", "a").await;
    put(&store, "tmp/deep/b.txt", "b").await;
    put(&store, "tmpfile.txt", "keep").await;

    let outcome = h.delete_folder("tmp/").await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded, vec!["tmp/", "tmp/a.txt", "tmp/deep/b.txt"]);

    let listing = h.list("").await.unwrap();
    assert!(folder_names(&listing).is_empty());
    assert_eq!(file_keys(&listing), vec!["tmpfile.txt"]);

    // Second delete is a no-op success
    let again = h.delete_folder("tmp/").await.unwrap();
    assert!(again.is_complete());
    assert!(again.succeeded.is_empty());
}

#[tokio::test]
async fn test_delete_folder_requires_folder_prefix() {
    let (_dir, _store, h) = default_setup();

    assert!(matches!(
        h.delete_folder("tmp").await,
        Err(HierarchyError::InvalidInput(_))
    ));
    assert!(matches!(
        h.delete_folder("").await,
        Err(HierarchyError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_rename_folder_moves_everything() {
    let (_dir, store, h) = default_setup();
    h.create_folder("", "src").await.unwrap();
    put(&store, "src/a.txt", "aaa").await;
    put(&store, "src/nested/b.txt", "bb").await;
    h.create_folder("src/", "empty").await.unwrap();

    let before = h.list("src/").await.unwrap();

    let outcome = h.rename_folder("src/", "dst/").await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded.len(), 4);

    let after = h.list("dst/").await.unwrap();
    assert_eq!(folder_names(&after), folder_names(&before));
    let sizes_before: Vec<(&str, u64)> =
        before.files.iter().map(|f| (f.name.as_str(), f.size)).collect();
    let sizes_after: Vec<(&str, u64)> =
        after.files.iter().map(|f| (f.name.as_str(), f.size)).collect();
    assert_eq!(sizes_after, sizes_before);
    assert_eq!(
        store.get("dst/nested/b.txt").await.unwrap(),
        Bytes::from("bb")
    );

    let old = h.list("src/").await.unwrap();
    assert!(old.folders.is_empty());
    assert!(old.files.is_empty());
}

#[tokio::test]
async fn test_rename_folder_leaves_lookalike_prefixes_alone() {
    let (_dir, store, h) = default_setup();
    put(&store, "docs/a.txt", "a").await;
    put(&store, "docs-old/b.txt", "b").await;

    h.rename_folder("docs/", "documents/").await.unwrap();

    assert!(store.get("docs-old/b.txt").await.is_ok());
    assert!(store.get("documents/a.txt").await.is_ok());
}

#[tokio::test]
async fn test_rename_folder_rejects_invalid_targets() {
    let (_dir, _store, h) = default_setup();

    for (old, new) in [("a/", "a/"), ("a/", "a/b/"), ("a", "b/"), ("a/", "b")] {
        assert!(
            matches!(
                h.rename_folder(old, new).await,
                Err(HierarchyError::InvalidInput(_))
            ),
            "{old} -> {new} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_rename_and_delete_file() {
    let (_dir, store, h) = default_setup();
    put(&store, "a/old.txt", "content").await;

    let outcome = h.rename_file("a/old.txt", "a/new.txt").await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded, vec!["a/old.txt"]);
    assert!(store.get("a/old.txt").await.is_err());
    assert_eq!(store.get("a/new.txt").await.unwrap(), Bytes::from("content"));

    h.delete_file("a/new.txt").await.unwrap();
    assert!(store.get("a/new.txt").await.is_err());

    // Deleting again is fine
    h.delete_file("a/new.txt").await.unwrap();
}

#[tokio::test]
async fn test_rename_missing_file_is_not_found() {
    let (_dir, _store, h) = default_setup();

    let result = h.rename_file("nope.txt", "still-nope.txt").await;
    assert!(matches!(
        result,
        Err(HierarchyError::Store(
            object_explorer::object_store::ObjectStoreError::NotFound(_)
        ))
    ));
}

#[tokio::test]
async fn test_walkthrough_create_upload_rename() {
    let (_dir, store, h) = default_setup();

    h.create_folder("", "docs").await.unwrap();
    let root = h.list("").await.unwrap();
    assert_eq!(root.folders.len(), 1);
    assert_eq!(root.folders[0].name, "docs");
    assert_eq!(root.folders[0].prefix, "docs/");

    store
        .put("docs/readme.txt", Bytes::new(), "text/plain")
        .await
        .unwrap();
    let docs = h.list("docs/").await.unwrap();
    assert_eq!(docs.files.len(), 1);
    assert_eq!(docs.files[0].key, "docs/readme.txt");
    assert_eq!(docs.files[0].name, "readme.txt");
    assert_eq!(docs.files[0].size, 0);

    h.rename_folder("docs/", "documents/").await.unwrap();

    let root = h.list("").await.unwrap();
    assert_eq!(folder_names(&root), vec!["documents"]);
    let documents = h.list("documents/").await.unwrap();
    assert_eq!(documents.files[0].name, "readme.txt");
    let docs = h.list("docs/").await.unwrap();
    assert!(docs.files.is_empty() && docs.folders.is_empty());
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_single_match_case_insensitive() {
    let (_dir, store, h) = default_setup();
    put(&store, "reports/Q1-Summary.pdf", "x").await;
    put(&store, "reports/q2.pdf", "x").await;
    put(&store, "notes.txt", "x").await;

    let results = h.search("summary").await.unwrap();
    assert_eq!(results.files.len(), 1);
    assert_eq!(results.files[0].key, "reports/Q1-Summary.pdf");
    assert_eq!(results.files[0].path, "reports/");
    assert!(!results.truncated);
}

#[tokio::test]
async fn test_search_matches_full_key_in_order() {
    let (_dir, store, h) = default_setup();
    put(&store, "b/report.txt", "x").await;
    put(&store, "a/report.txt", "x").await;
    put(&store, "report/c.txt", "x").await;

    let results = h.search("REPORT").await.unwrap();
    let keys: Vec<&str> = results.files.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["a/report.txt", "b/report.txt", "report/c.txt"]);
}

#[tokio::test]
async fn test_search_window_flags_truncation() {
    let (_dir, store, h) = setup(HierarchyConfig {
        search_window: 3,
        ..Default::default()
    });
    for key in ["a1", "a2", "a3", "a4-target"] {
        put(&store, key, "x").await;
    }

    let results = h.search("target").await.unwrap();
    assert!(results.files.is_empty());
    assert!(results.truncated);

    let results = h.search("a2").await.unwrap();
    assert_eq!(results.files.len(), 1);
}

#[tokio::test]
async fn test_search_rejects_blank_query() {
    let (_dir, _store, h) = default_setup();

    assert!(matches!(
        h.search("   ").await,
        Err(HierarchyError::InvalidInput(_))
    ));
}

// ============================================================================
// Capabilities
// ============================================================================

#[tokio::test]
async fn test_issue_download_for_missing_key_succeeds() {
    let (_dir, _store, h) = default_setup();

    let capability = h.issue_download("not/there.txt").await.unwrap();
    assert_eq!(capability.key, "not/there.txt");
    assert!(capability.url.contains("op=get"));
    assert!(capability.expires_at > chrono::Utc::now());
}

#[tokio::test]
async fn test_issue_upload_guesses_content_type() {
    let (_dir, _store, h) = default_setup();

    let explicit = h.issue_upload("a.bin", Some("image/png")).await.unwrap();
    let guessed = h.issue_upload("a.bin", None).await.unwrap();
    // Different content types produce different signatures
    assert_ne!(explicit.url, guessed.url);
    assert!(guessed.url.contains("op=put"));
}

#[tokio::test]
async fn test_issue_rejects_empty_key() {
    let (_dir, _store, h) = default_setup();

    assert!(matches!(
        h.issue_download("").await,
        Err(HierarchyError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_issue_upload_rejects_folder_and_malformed_keys() {
    let (_dir, _store, h) = default_setup();

    for key in ["docs/", "a//b.txt", "/a.txt"] {
        assert!(
            matches!(
                h.issue_upload(key, None).await,
                Err(HierarchyError::InvalidInput(_))
            ),
            "upload to '{key}' should be rejected"
        );
    }
}

#[tokio::test]
async fn test_capability_expiry_matches_signed_url() {
    let (_dir, _store, h) = default_setup();

    let capability = h.issue_upload("docs/a.txt", None).await.unwrap();
    let expires = format!("expires={}&", capability.expires_at.timestamp());
    assert!(capability.url.contains(&expires));
    assert_eq!(capability.expires_at.timestamp_subsec_nanos(), 0);
}

// ============================================================================
// Long keys
// ============================================================================

#[tokio::test]
async fn test_long_folder_names_round_trip() {
    let (_dir, store, h) = default_setup();
    let name = "b".repeat(200);

    let key = h.create_folder("", &name).await.unwrap();
    put(&store, &format!("{key}{}.txt", "c".repeat(200)), "x").await;

    let root = h.list("").await.unwrap();
    assert_eq!(folder_names(&root), vec![name.as_str()]);
    let inner = h.list(&key).await.unwrap();
    assert_eq!(inner.files.len(), 1);
    assert_eq!(inner.files[0].name.len(), 204);

    let outcome = h.rename_folder(&key, "short/").await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded.len(), 2);
}
