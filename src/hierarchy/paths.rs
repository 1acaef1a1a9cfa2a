//! Key, scope and breadcrumb derivation.
//!
//! Everything here is pure and total: validation of user-supplied names
//! happens in the callers that need it, via [`validate_name`].

pub const DELIMITER: char = '/';

/// Marker key for folder `name` directly under `scope`.
pub fn folder_key(scope: &str, name: &str) -> String {
    format!("{scope}{name}{DELIMITER}")
}

/// Key for file `name` directly under `scope`.
pub fn file_key(scope: &str, name: &str) -> String {
    format!("{scope}{name}")
}

/// The non-empty segments of `scope`, in path order.
pub fn breadcrumbs(scope: &str) -> Vec<String> {
    scope
        .split(DELIMITER)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scope addressed by a breadcrumb trail (`""` for an empty trail).
pub fn scope_of<S: AsRef<str>>(crumbs: &[S]) -> String {
    if crumbs.is_empty() {
        return String::new();
    }
    let parts: Vec<&str> = crumbs.iter().map(|c| c.as_ref()).collect();
    format!("{}{DELIMITER}", parts.join("/"))
}

/// Scope one level above the trail's last segment; the root's parent is the root.
pub fn parent_scope<S: AsRef<str>>(crumbs: &[S]) -> String {
    match crumbs.split_last() {
        Some((_, rest)) => scope_of(rest),
        None => String::new(),
    }
}

/// Last path segment of a key or prefix, ignoring a trailing delimiter.
pub fn name_of(key: &str) -> &str {
    let trimmed = key.strip_suffix(DELIMITER).unwrap_or(key);
    trimmed
        .rsplit_once(DELIMITER)
        .map(|(_, name)| name)
        .unwrap_or(trimmed)
}

/// Everything up to and including the last delimiter of a file key.
pub fn parent_path(key: &str) -> &str {
    key.rfind(DELIMITER).map(|i| &key[..=i]).unwrap_or("")
}

/// Move `key` from under `old_prefix` to under `new_prefix`.
///
/// Only a leading occurrence is replaced, so a folder name that repeats
/// deeper in the key is left alone. Keys outside `old_prefix` are returned
/// unchanged.
pub fn rebase(key: &str, old_prefix: &str, new_prefix: &str) -> String {
    match key.strip_prefix(old_prefix) {
        Some(rest) => format!("{new_prefix}{rest}"),
        None => key.to_string(),
    }
}

pub fn is_folder_prefix(key: &str) -> bool {
    key.ends_with(DELIMITER)
}

/// A folder or file name must be a single, non-empty path segment.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }
    if name.contains(DELIMITER) {
        return Err(format!("name must not contain '{DELIMITER}'"));
    }
    Ok(())
}

/// Bring a caller-supplied scope into canonical form: empty, or ending in `/`
/// with no empty segments.
pub fn normalize_scope(scope: &str) -> Result<String, String> {
    if scope.is_empty() {
        return Ok(String::new());
    }
    if scope.starts_with(DELIMITER) {
        return Err(format!("scope '{scope}' must not start with '{DELIMITER}'"));
    }
    let trimmed = scope.strip_suffix(DELIMITER).unwrap_or(scope);
    if trimmed.split(DELIMITER).any(str::is_empty) {
        return Err(format!("scope '{scope}' contains an empty segment"));
    }
    Ok(format!("{trimmed}{DELIMITER}"))
}
