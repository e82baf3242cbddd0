//! crates/family_records_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or object stores.

use crate::domain::{Document, FamilyMember, Identity, NewDocument, Role, User, UserCredentials};
use crate::session::NavigationState;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness rule enforced by the backing store was violated.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A sign-in session as persisted between requests.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub identity: Identity,
    pub navigation: NavigationState,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    /// Fails with `PortError::Conflict` if the email is already registered.
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    // --- Family Members ---
    async fn create_member(
        &self,
        full_name: &str,
        dob: Option<NaiveDate>,
        created_by: Uuid,
    ) -> PortResult<FamilyMember>;

    /// All members, newest-created first.
    async fn list_members(&self) -> PortResult<Vec<FamilyMember>>;

    async fn get_member(&self, member_id: Uuid) -> PortResult<FamilyMember>;

    /// Deletes the member and every document attached to it.
    async fn delete_member(&self, member_id: Uuid) -> PortResult<()>;

    // --- Documents ---
    async fn create_document(&self, document: NewDocument) -> PortResult<Document>;

    /// The member's documents, most recently uploaded first.
    async fn list_documents_for_member(&self, member_id: Uuid) -> PortResult<Vec<Document>>;

    // --- Sign-in Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Fails with `PortError::NotFound` if the session does not exist or has expired.
    async fn load_auth_session(&self, session_id: &str) -> PortResult<StoredSession>;

    async fn save_navigation(&self, session_id: &str, navigation: &NavigationState) -> PortResult<()>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// Where uploaded document files live.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stores the bytes under a freshly generated key and returns that key.
    /// Two uploads never share a key, even for the same file name.
    async fn upload(&self, data: Bytes, file_name: &str, content_type: &str) -> PortResult<String>;

    /// A URL the stored bytes can be fetched from until `expires_in` has elapsed.
    /// Fails with `PortError::NotFound` if nothing is stored under the key.
    async fn get_signed_url(&self, storage_key: &str, expires_in: Duration) -> PortResult<String>;
}
