//! services/api/src/adapters/supabase_storage.rs
//!
//! This module contains the adapter for the Supabase Storage REST API.
//! It implements the `StorageService` port from the `core` crate.

use crate::adapters::keys;
use async_trait::async_trait;
use bytes::Bytes;
use family_records_core::ports::{PortError, PortResult, StorageService};
use reqwest::{header, Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `StorageService` port using a Supabase storage bucket.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: Url,
    api_key: String,
    bucket: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    /// Creates a new `SupabaseStorage`.
    pub fn new(
        client: Client,
        project_url: &str,
        api_key: String,
        bucket: String,
    ) -> PortResult<Self> {
        let base_url = Url::parse(project_url).map_err(|e| {
            PortError::Unexpected(format!("Invalid Supabase URL '{}': {}", project_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(PortError::Unexpected(format!(
                "Supabase URL '{}' cannot be used as a base URL",
                project_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            api_key,
            bucket,
        })
    }

    /// `{project}/storage/v1/{segments...}`, with each segment percent-encoded.
    fn storage_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> PortResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected("Supabase URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, storage_key: &str) -> PortResult<Url> {
        self.storage_url(
            ["object", self.bucket.as_str()]
                .into_iter()
                .chain(storage_key.split('/')),
        )
    }

    fn sign_url(&self, storage_key: &str) -> PortResult<Url> {
        self.storage_url(
            ["object", "sign", self.bucket.as_str()]
                .into_iter()
                .chain(storage_key.split('/')),
        )
    }

    /// The sign endpoint answers with a path relative to `/storage/v1`.
    fn absolute_signed_url(&self, signed_path: &str) -> PortResult<String> {
        let base = self.storage_url(std::iter::empty::<&str>())?;
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            signed_path.trim_start_matches('/')
        );
        Ok(joined)
    }
}

async fn failure_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e))
}

//=========================================================================================
// `StorageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StorageService for SupabaseStorage {
    async fn upload(&self, data: Bytes, file_name: &str, content_type: &str) -> PortResult<String> {
        let key = keys::remote_key(file_name);
        let url = self.object_url(&key)?;
        let size = data.len();

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = failure_body(response).await;
            error!(key = %key, %status, "Supabase upload failed: {}", body);
            return Err(match status {
                StatusCode::CONFLICT => {
                    PortError::Conflict(format!("Storage key '{}' already exists", key))
                }
                _ => PortError::Storage(format!("Upload failed with status {}: {}", status, body)),
            });
        }

        info!(key = %key, size_bytes = size, "Uploaded document file to Supabase");
        Ok(key)
    }

    async fn get_signed_url(&self, storage_key: &str, expires_in: Duration) -> PortResult<String> {
        let url = self.sign_url(storage_key)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&SignRequest {
                expires_in: expires_in.as_secs(),
            })
            .send()
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;

        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST) {
            return Err(PortError::NotFound(storage_key.to_string()));
        }
        if !status.is_success() {
            let body = failure_body(response).await;
            error!(key = %storage_key, %status, "Supabase signing failed: {}", body);
            return Err(PortError::Storage(format!(
                "Signing failed with status {}: {}",
                status, body
            )));
        }

        let signed: SignResponse = response
            .json()
            .await
            .map_err(|e| PortError::Storage(format!("Malformed signing response: {}", e)))?;
        if signed.signed_url.is_empty() {
            return Err(PortError::NotFound(storage_key.to_string()));
        }
        self.absolute_signed_url(&signed.signed_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(url: &str) -> SupabaseStorage {
        SupabaseStorage::new(Client::new(), url, "anon".to_string(), "medical docs".to_string())
            .unwrap()
    }

    #[test]
    fn object_urls_are_encoded_per_segment() {
        let storage = storage("https://project.supabase.co/");
        let url = storage.object_url("uploads/abc/blood_test.pdf").unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/storage/v1/object/medical%20docs/uploads/abc/blood_test.pdf"
        );
    }

    #[test]
    fn sign_urls_use_the_sign_endpoint() {
        let storage = storage("https://project.supabase.co");
        let url = storage.sign_url("uploads/abc/scan.png").unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/storage/v1/object/sign/medical%20docs/uploads/abc/scan.png"
        );
    }

    #[test]
    fn signed_paths_resolve_under_storage_v1() {
        let storage = storage("https://project.supabase.co");
        let url = storage
            .absolute_signed_url("/object/sign/docs/uploads/abc/scan.png?token=xyz")
            .unwrap();
        assert_eq!(
            url,
            "https://project.supabase.co/storage/v1/object/sign/docs/uploads/abc/scan.png?token=xyz"
        );
    }

    #[test]
    fn invalid_project_urls_are_rejected() {
        let result = SupabaseStorage::new(
            Client::new(),
            "not a url",
            "anon".to_string(),
            "docs".to_string(),
        );
        assert!(result.is_err());
    }
}
