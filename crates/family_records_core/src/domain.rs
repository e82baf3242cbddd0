//! crates/family_records_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Label shown in place of a missing date of birth.
pub const BIRTH_DATE_NOT_PROVIDED: &str = "Not provided";

/// File extensions accepted for document uploads, with the MIME type each one is stored under.
pub const ACCEPTED_FILE_TYPES: [(&str, &str); 4] = [
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
];

//=========================================================================================
// Users and Roles
//=========================================================================================

/// The two flat roles. Only `Admin` may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Viewer => "viewer",
        }
    }

    /// Whether this role carries write access (add member, upload, delete).
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "viewer" => Ok(Role::Viewer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// Only used internally for sign-in - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// The signed-in identity carried by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}

//=========================================================================================
// Family Members and Documents
//=========================================================================================

/// A family member profile that documents are attached to.
#[derive(Debug, Clone)]
pub struct FamilyMember {
    pub id: Uuid,
    pub full_name: String,
    pub dob: Option<NaiveDate>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl FamilyMember {
    pub fn birth_date_label(&self) -> String {
        self.dob
            .map(|d| d.to_string())
            .unwrap_or_else(|| BIRTH_DATE_NOT_PROVIDED.to_string())
    }
}

/// A medical document uploaded for a family member.
///
/// `doc_date` is the date the record pertains to; `created_at` is the upload time.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub member_id: Uuid,
    pub uploaded_by: Uuid,
    pub doc_date: NaiveDate,
    pub condition: String,
    pub description: Option<String>,
    pub storage_key: String,
    pub file_name: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// The fields of a document record before the database assigns its id and upload time.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub member_id: Uuid,
    pub uploaded_by: Uuid,
    pub doc_date: NaiveDate,
    pub condition: String,
    pub description: Option<String>,
    pub storage_key: String,
    pub file_name: String,
    pub mime_type: String,
}

/// Returns the MIME type a file is stored under, or `None` if its extension is not accepted.
pub fn accepted_mime_type(file_name: &str) -> Option<&'static str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ACCEPTED_FILE_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}
