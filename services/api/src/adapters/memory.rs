//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. It follows the same
//! uniqueness, ordering and cascade rules as the PostgreSQL adapter and is selected
//! with `DATABASE_URL=memory`. Nothing survives a restart.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use family_records_core::domain::{
    Document, FamilyMember, Identity, NewDocument, Role, User, UserCredentials,
};
use family_records_core::ports::{DatabaseService, PortError, PortResult, StoredSession};
use family_records_core::session::NavigationState;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

struct UserRow {
    user: User,
    password_hash: String,
}

struct SessionRow {
    user_id: Uuid,
    navigation: NavigationState,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: Vec<UserRow>,
    members: Vec<FamilyMember>,
    documents: Vec<Document>,
    sessions: HashMap<String, SessionRow>,
}

/// A mutex-guarded set of tables. Each operation holds the lock for its whole duration.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("In-memory database lock poisoned".to_string()))
    }
}

/// Newest first; insertion order breaks ties so equal timestamps still sort newest first.
fn newest_first<T>(rows: impl DoubleEndedIterator<Item = T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut rows: Vec<T> = rows.rev().collect();
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows
}

#[async_trait]
impl DatabaseService for MemoryDatabase {
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> PortResult<User> {
        let mut tables = self.lock()?;
        if tables.users.iter().any(|row| row.user.email == email) {
            return Err(PortError::Conflict(format!("Email {} is already registered", email)));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
            created_at: Utc::now(),
        };
        tables.users.push(UserRow {
            user: user.clone(),
            password_hash: password_hash.to_string(),
        });
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.lock()?;
        tables
            .users
            .iter()
            .find(|row| row.user.email == email)
            .map(|row| UserCredentials {
                id: row.user.id,
                email: row.user.email.clone(),
                password_hash: row.password_hash.clone(),
                role: row.user.role,
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_member(
        &self,
        full_name: &str,
        dob: Option<NaiveDate>,
        created_by: Uuid,
    ) -> PortResult<FamilyMember> {
        let mut tables = self.lock()?;
        if !tables.users.iter().any(|row| row.user.id == created_by) {
            return Err(PortError::NotFound(format!("User {} not found", created_by)));
        }
        let member = FamilyMember {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            dob,
            created_by,
            created_at: Utc::now(),
        };
        tables.members.push(member.clone());
        Ok(member)
    }

    async fn list_members(&self) -> PortResult<Vec<FamilyMember>> {
        let tables = self.lock()?;
        Ok(newest_first(tables.members.iter().cloned(), |m| m.created_at))
    }

    async fn get_member(&self, member_id: Uuid) -> PortResult<FamilyMember> {
        let tables = self.lock()?;
        tables
            .members
            .iter()
            .find(|m| m.id == member_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Member {} not found", member_id)))
    }

    async fn delete_member(&self, member_id: Uuid) -> PortResult<()> {
        let mut tables = self.lock()?;
        let before = tables.members.len();
        tables.members.retain(|m| m.id != member_id);
        if tables.members.len() == before {
            return Err(PortError::NotFound(format!("Member {} not found", member_id)));
        }
        tables.documents.retain(|d| d.member_id != member_id);
        Ok(())
    }

    async fn create_document(&self, document: NewDocument) -> PortResult<Document> {
        let mut tables = self.lock()?;
        if !tables.members.iter().any(|m| m.id == document.member_id) {
            return Err(PortError::NotFound(format!("Member {} not found", document.member_id)));
        }
        if !tables.users.iter().any(|row| row.user.id == document.uploaded_by) {
            return Err(PortError::NotFound(format!("User {} not found", document.uploaded_by)));
        }
        if tables.documents.iter().any(|d| d.storage_key == document.storage_key) {
            return Err(PortError::Conflict(format!(
                "Storage key {} is already recorded",
                document.storage_key
            )));
        }
        let record = Document {
            id: Uuid::new_v4(),
            member_id: document.member_id,
            uploaded_by: document.uploaded_by,
            doc_date: document.doc_date,
            condition: document.condition,
            description: document.description,
            storage_key: document.storage_key,
            file_name: document.file_name,
            mime_type: document.mime_type,
            created_at: Utc::now(),
        };
        tables.documents.push(record.clone());
        Ok(record)
    }

    async fn list_documents_for_member(&self, member_id: Uuid) -> PortResult<Vec<Document>> {
        let tables = self.lock()?;
        Ok(newest_first(
            tables.documents.iter().filter(|d| d.member_id == member_id).cloned(),
            |d| d.created_at,
        ))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        tables.sessions.retain(|_, row| row.expires_at > now);
        if !tables.users.iter().any(|row| row.user.id == user_id) {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        if tables.sessions.contains_key(session_id) {
            return Err(PortError::Conflict("Session id already in use".to_string()));
        }
        tables.sessions.insert(
            session_id.to_string(),
            SessionRow {
                user_id,
                navigation: NavigationState::signed_in(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn load_auth_session(&self, session_id: &str) -> PortResult<StoredSession> {
        let mut tables = self.lock()?;
        if tables
            .sessions
            .get(session_id)
            .is_some_and(|row| row.expires_at <= Utc::now())
        {
            tables.sessions.remove(session_id);
        }
        let row = tables
            .sessions
            .get(session_id)
            .ok_or_else(|| PortError::NotFound("Session not found or expired".to_string()))?;
        let user = tables
            .users
            .iter()
            .find(|u| u.user.id == row.user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", row.user_id)))?;
        Ok(StoredSession {
            identity: Identity::from(user.user.clone()),
            navigation: row.navigation.clone(),
        })
    }

    async fn save_navigation(&self, session_id: &str, navigation: &NavigationState) -> PortResult<()> {
        let mut tables = self.lock()?;
        let row = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| PortError::NotFound("Session not found".to_string()))?;
        row.navigation = navigation.clone();
        Ok(())
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut tables = self.lock()?;
        tables.sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_document(member_id: Uuid, uploaded_by: Uuid, key: &str) -> NewDocument {
        NewDocument {
            member_id,
            uploaded_by,
            doc_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            condition: "Flu".to_string(),
            description: None,
            storage_key: key.to_string(),
            file_name: "scan.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = MemoryDatabase::new();
        db.create_user("a@example.com", "hash", Role::Admin).await.unwrap();
        let err = db.create_user("a@example.com", "hash", Role::Viewer).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
        let stored = db.get_user_by_email("a@example.com").await.unwrap();
        assert_eq!(stored.role, Role::Admin);

        // case-sensitive
        db.create_user("A@example.com", "hash", Role::Viewer).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_registrations_admit_exactly_one() {
        let db = Arc::new(MemoryDatabase::new());
        let attempts = (0..8).map(|_| {
            let db = db.clone();
            tokio::spawn(async move { db.create_user("race@example.com", "hash", Role::Admin).await })
        });

        let mut successes = 0;
        let mut conflicts = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(PortError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn members_are_listed_newest_first() {
        let db = MemoryDatabase::new();
        let user = db.create_user("a@example.com", "hash", Role::Admin).await.unwrap();
        let first = db.create_member("First", None, user.id).await.unwrap();
        let second = db.create_member("Second", None, user.id).await.unwrap();

        let listed: Vec<Uuid> = db.list_members().await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(listed, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn deleting_a_member_cascades_to_its_documents_only() {
        let db = MemoryDatabase::new();
        let user = db.create_user("a@example.com", "hash", Role::Admin).await.unwrap();
        let doomed = db.create_member("Doomed", None, user.id).await.unwrap();
        let kept = db.create_member("Kept", None, user.id).await.unwrap();

        db.create_document(new_document(doomed.id, user.id, "k1")).await.unwrap();
        db.create_document(new_document(doomed.id, user.id, "k2")).await.unwrap();
        let survivor = db.create_document(new_document(kept.id, user.id, "k3")).await.unwrap();

        db.delete_member(doomed.id).await.unwrap();

        assert!(db.list_documents_for_member(doomed.id).await.unwrap().is_empty());
        let remaining = db.list_documents_for_member(kept.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, survivor.id);
        assert!(matches!(db.get_member(doomed.id).await, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn documents_require_an_existing_member_and_a_unique_key() {
        let db = MemoryDatabase::new();
        let user = db.create_user("a@example.com", "hash", Role::Admin).await.unwrap();
        let member = db.create_member("Jane", None, user.id).await.unwrap();

        let orphan = db.create_document(new_document(Uuid::new_v4(), user.id, "k1")).await;
        assert!(matches!(orphan, Err(PortError::NotFound(_))));

        db.create_document(new_document(member.id, user.id, "k1")).await.unwrap();
        let dup = db.create_document(new_document(member.id, user.id, "k1")).await;
        assert!(matches!(dup, Err(PortError::Conflict(_))));
    }

    #[tokio::test]
    async fn sessions_expire_and_persist_navigation() {
        let db = MemoryDatabase::new();
        let user = db.create_user("a@example.com", "hash", Role::Viewer).await.unwrap();

        db.create_auth_session("live", user.id, Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        db.create_auth_session("stale", user.id, Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();

        let mut navigation = db.load_auth_session("live").await.unwrap().navigation;
        navigation.open_member(Uuid::new_v4());
        db.save_navigation("live", &navigation).await.unwrap();

        let loaded = db.load_auth_session("live").await.unwrap();
        assert_eq!(loaded.navigation, navigation);
        assert_eq!(loaded.identity.role, Role::Viewer);
        assert!(matches!(db.load_auth_session("stale").await, Err(PortError::NotFound(_))));

        db.delete_auth_session("live").await.unwrap();
        assert!(matches!(db.load_auth_session("live").await, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let db = MemoryDatabase::new();
        let user = db.create_user("a@example.com", "hash", Role::Viewer).await.unwrap();
        let past = Utc::now() - chrono::Duration::hours(1);

        db.create_auth_session("old-1", user.id, past).await.unwrap();
        assert!(db.load_auth_session("old-1").await.is_err());
        assert!(!db.lock().unwrap().sessions.contains_key("old-1"));

        db.create_auth_session("old-2", user.id, past).await.unwrap();
        db.create_auth_session("fresh", user.id, Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        let sessions: Vec<String> = db.lock().unwrap().sessions.keys().cloned().collect();
        assert_eq!(sessions, vec!["fresh".to_string()]);
    }
}
