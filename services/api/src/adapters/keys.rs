//! Storage key generation shared by every document store.
//!
//! Keys always embed a fresh v4 UUID, so uploading the same file name twice yields two keys.
//! The original file name is kept in the document record; the key only carries a
//! sanitised copy of it.

use uuid::Uuid;

/// Reduces a file name to `[A-Za-z0-9._-]`, replacing anything else with `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `{uuid}_{name}`, flat under the local storage root.
pub fn local_key(file_name: &str) -> String {
    format!("{}_{}", Uuid::new_v4(), sanitize_file_name(file_name))
}

/// `uploads/{uuid}/{name}` inside the remote bucket.
pub fn remote_key(file_name: &str) -> String {
    format!("uploads/{}/{}", Uuid::new_v4(), sanitize_file_name(file_name))
}
