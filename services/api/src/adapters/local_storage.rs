//! services/api/src/adapters/local_storage.rs
//!
//! Stores document files on the local filesystem and implements the `StorageService`
//! port from the `core` crate.
//!
//! Signed URLs point back at this service (`{base_url}/files/{key}`) and carry an expiry
//! timestamp plus an HMAC-SHA256 signature over `"{key}:{expires}"`. The `/files` route
//! checks both with [`LocalStorage::open_signed`] before streaming the file.

use crate::adapters::keys;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use family_records_core::ports::{PortError, PortResult, StorageService};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `StorageService` port on top of a directory.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
    secret: Vec<u8>,
}

impl LocalStorage {
    /// Creates a new `LocalStorage`, creating the root directory if needed.
    pub async fn new(
        root: impl Into<PathBuf>,
        base_url: impl Into<String>,
        secret: impl Into<Vec<u8>>,
    ) -> PortResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            PortError::Storage(format!(
                "Failed to create storage directory '{}': {}",
                root.display(),
                e
            ))
        })?;
        info!(path = %root.display(), "Local document store initialized");

        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        })
    }

    /// Resolves a key to a path under the root, refusing anything that could escape it.
    fn key_to_path(&self, storage_key: &str) -> PortResult<PathBuf> {
        let key = Path::new(storage_key);
        let mut components = key.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(key)),
            _ => Err(PortError::NotFound(format!(
                "Invalid storage key '{}'",
                storage_key
            ))),
        }
    }

    fn signature(&self, storage_key: &str, expires: i64) -> PortResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        mac.update(format!("{}:{}", storage_key, expires).as_bytes());
        Ok(mac)
    }

    /// Checks a signed link and returns the path of the file it grants access to.
    ///
    /// Expired or forged links fail with `PortError::Unauthorized`.
    pub async fn open_signed(
        &self,
        storage_key: &str,
        expires: i64,
        signature: &str,
    ) -> PortResult<PathBuf> {
        if expires < Utc::now().timestamp() {
            warn!(key = %storage_key, "Rejected expired file link");
            return Err(PortError::Unauthorized);
        }
        let provided = hex::decode(signature).map_err(|_| PortError::Unauthorized)?;
        self.signature(storage_key, expires)?
            .verify_slice(&provided)
            .map_err(|_| {
                warn!(key = %storage_key, "Rejected file link with a bad signature");
                PortError::Unauthorized
            })?;

        let path = self.key_to_path(storage_key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(PortError::NotFound(storage_key.to_string()));
        }
        Ok(path)
    }
}

//=========================================================================================
// `StorageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StorageService for LocalStorage {
    async fn upload(&self, data: Bytes, file_name: &str, _content_type: &str) -> PortResult<String> {
        let key = keys::local_key(file_name);
        let path = self.key_to_path(&key)?;

        // create_new: an existing file is never overwritten.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    PortError::Conflict(format!("Storage key '{}' already exists", key))
                }
                _ => PortError::Storage(format!("Failed to create '{}': {}", path.display(), e)),
            })?;
        file.write_all(&data)
            .await
            .map_err(|e| PortError::Storage(format!("Failed to write '{}': {}", path.display(), e)))?;
        file.sync_all()
            .await
            .map_err(|e| PortError::Storage(format!("Failed to sync '{}': {}", path.display(), e)))?;

        info!(key = %key, size_bytes = data.len(), "Stored document file");
        Ok(key)
    }

    async fn get_signed_url(&self, storage_key: &str, expires_in: Duration) -> PortResult<String> {
        let path = self.key_to_path(storage_key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(PortError::NotFound(storage_key.to_string()));
        }

        let ttl = i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX / 2);
        let expires = Utc::now().timestamp().saturating_add(ttl);
        let signature = hex::encode(self.signature(storage_key, expires)?.finalize().into_bytes());
        debug!(key = %storage_key, expires, "Signed local file link");

        Ok(format!(
            "{}/files/{}?expires={}&signature={}",
            self.base_url, storage_key, expires, signature
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> LocalStorage {
        LocalStorage::new(dir.path(), "http://localhost:3000/", b"test-secret".to_vec())
            .await
            .unwrap()
    }

    /// Splits a signed URL into (key, expires, signature).
    fn parts(url: &str) -> (String, i64, String) {
        let rest = url.strip_prefix("http://localhost:3000/files/").unwrap();
        let (key, query) = rest.split_once('?').unwrap();
        let mut expires = 0;
        let mut signature = String::new();
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("signature", v) => signature = v.to_string(),
                _ => {}
            }
        }
        (key.to_string(), expires, signature)
    }

    #[tokio::test]
    async fn same_file_name_gets_distinct_keys() {
        let dir = TempDir::new().unwrap();
        let storage = store(&dir).await;

        let first = storage
            .upload(Bytes::from_static(b"one"), "scan.pdf", "application/pdf")
            .await
            .unwrap();
        let second = storage
            .upload(Bytes::from_static(b"two"), "scan.pdf", "application/pdf")
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(dir.path().join(&first)).unwrap(), b"one");
        assert_eq!(std::fs::read(dir.path().join(&second)).unwrap(), b"two");
    }

    #[tokio::test]
    async fn signed_url_round_trips_through_open_signed() {
        let dir = TempDir::new().unwrap();
        let storage = store(&dir).await;
        let key = storage
            .upload(Bytes::from_static(b"%PDF"), "scan.pdf", "application/pdf")
            .await
            .unwrap();

        let url = storage
            .get_signed_url(&key, Duration::from_secs(3600))
            .await
            .unwrap();
        let (url_key, expires, signature) = parts(&url);
        assert_eq!(url_key, key);
        assert!(expires > Utc::now().timestamp());

        let path = storage.open_signed(&url_key, expires, &signature).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn tampered_or_expired_links_are_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = store(&dir).await;
        let key = storage
            .upload(Bytes::from_static(b"img"), "chart.png", "image/png")
            .await
            .unwrap();
        let url = storage
            .get_signed_url(&key, Duration::from_secs(60))
            .await
            .unwrap();
        let (key, expires, signature) = parts(&url);

        let extended = storage.open_signed(&key, expires + 3600, &signature).await;
        assert!(matches!(extended, Err(PortError::Unauthorized)));

        let forged = storage.open_signed(&key, expires, "deadbeef").await;
        assert!(matches!(forged, Err(PortError::Unauthorized)));

        let past = Utc::now().timestamp() - 10;
        let mac = storage.signature(&key, past).unwrap().finalize().into_bytes();
        let expired = storage.open_signed(&key, past, &hex::encode(mac)).await;
        assert!(matches!(expired, Err(PortError::Unauthorized)));
    }

    #[tokio::test]
    async fn unknown_or_escaping_keys_are_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = store(&dir).await;

        let missing = storage
            .get_signed_url("nothing-here.pdf", Duration::from_secs(60))
            .await;
        assert!(matches!(missing, Err(PortError::NotFound(_))));

        let escaping = storage
            .get_signed_url("../secret.pdf", Duration::from_secs(60))
            .await;
        assert!(matches!(escaping, Err(PortError::NotFound(_))));
    }
}
