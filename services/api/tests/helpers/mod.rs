//! Test helpers: build the router over the in-memory database and a temporary local store.

#![allow(dead_code)]

use api_lib::adapters::{LocalStorage, MemoryDatabase};
use api_lib::app::{AppSettings, RecordsApp};
use api_lib::config::Config;
use api_lib::credentials::Credentials;
use api_lib::web::{self, AppState};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use family_records_core::domain::Role;
use family_records_core::ports::{DatabaseService, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const BASE_URL: &str = "http://localhost:3000";
pub const PASSWORD: &str = "correct horse battery staple";

/// Test application: server plus the pieces tests reach into directly.
pub struct TestApp {
    pub server: TestServer,
    pub db: Arc<MemoryDatabase>,
    pub credentials: Credentials,
    pub _temp_dir: TempDir,
}

fn test_config(dir: &TempDir, overrides: &[(&'static str, &str)]) -> Config {
    let mut vars: HashMap<&str, String> = [
        ("DATABASE_URL", "memory".to_string()),
        ("STORAGE_BACKEND", "local".to_string()),
        ("LOCAL_STORAGE_PATH", dir.path().display().to_string()),
        ("LOCAL_STORAGE_BASE_URL", BASE_URL.to_string()),
        ("FILE_URL_SECRET", "integration-test-secret".to_string()),
        ("PASSWORD_HASH_MEMORY_KIB", "8".to_string()),
        ("PASSWORD_HASH_ITERATIONS", "1".to_string()),
        ("PASSWORD_HASH_PARALLELISM", "1".to_string()),
    ]
    .into_iter()
    .collect();
    for (key, value) in overrides {
        vars.insert(*key, value.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("Failed to build test config")
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(&[], None).await
}

/// Like `spawn_app`, with extra environment settings and optionally another document
/// store in place of the local one.
pub async fn spawn_app_with(
    overrides: &[(&'static str, &str)],
    storage_override: Option<Arc<dyn StorageService>>,
) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = Arc::new(test_config(&temp_dir, overrides));

    let db = Arc::new(MemoryDatabase::new());
    let local = Arc::new(
        LocalStorage::new(temp_dir.path(), BASE_URL, b"integration-test-secret".to_vec())
            .await
            .expect("Failed to create local storage"),
    );
    let (storage, file_server): (Arc<dyn StorageService>, _) = match storage_override {
        Some(storage) => (storage, None),
        None => (local.clone() as Arc<dyn StorageService>, Some(local)),
    };
    let credentials =
        Credentials::new(config.password_hashing).expect("Failed to build credentials");
    let settings = AppSettings {
        registration_role: config.registration_role,
        signed_url_ttl: config.signed_url_ttl,
        session_ttl: config.session_ttl,
    };

    let state = Arc::new(AppState {
        app: Arc::new(RecordsApp::new(
            db.clone(),
            storage,
            credentials.clone(),
            settings,
        )),
        config,
        file_server,
    });

    let server = TestServer::new(web::router(state)).expect("Failed to create test server");
    TestApp {
        server,
        db,
        credentials,
        _temp_dir: temp_dir,
    }
}

/// The `name=value` pair of the session cookie set by a login response.
pub fn session_cookie(response: &TestResponse) -> String {
    let header = response.header("set-cookie");
    header
        .to_str()
        .expect("set-cookie is not ASCII")
        .split(';')
        .next()
        .expect("empty set-cookie")
        .to_string()
}

impl TestApp {
    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.server
            .post("/auth/login")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .await
    }

    /// Creates an account with the given role directly in the database and signs in.
    pub async fn sign_in_as(&self, email: &str, role: Role) -> String {
        let hash = self.credentials.hash(PASSWORD).expect("Failed to hash");
        self.db
            .create_user(email, &hash, role)
            .await
            .expect("Failed to create user");
        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status_code(), 200);
        session_cookie(&response)
    }

    pub async fn add_member(&self, cookie: &str, full_name: &str) -> Uuid {
        let response = self
            .server
            .post("/members")
            .add_header("Cookie", cookie)
            .json(&serde_json::json!({ "full_name": full_name }))
            .await;
        assert_eq!(response.status_code(), 201);
        let body: serde_json::Value = response.json();
        Uuid::parse_str(body["id"].as_str().expect("member id missing")).expect("bad member id")
    }

    pub async fn upload(
        &self,
        cookie: &str,
        member_id: Uuid,
        condition: &str,
        file_name: &str,
        mime_type: &str,
    ) -> TestResponse {
        let part = Part::bytes(bytes::Bytes::from(format!("contents of {}", file_name)))
            .file_name(file_name)
            .mime_type(mime_type);
        let form = MultipartForm::new()
            .add_text("condition", condition)
            .add_text("description", "uploaded in a test")
            .add_part("file", part);
        self.post_form(cookie, member_id, form).await
    }

    pub async fn post_form(&self, cookie: &str, member_id: Uuid, form: MultipartForm) -> TestResponse {
        self.server
            .post(&format!("/members/{}/documents", member_id))
            .add_header("Cookie", cookie)
            .multipart(form)
            .await
    }

    pub async fn view(&self, cookie: &str, query: &str) -> serde_json::Value {
        let response = self
            .server
            .get(&format!("/view{}", query))
            .add_header("Cookie", cookie)
            .await;
        assert_eq!(response.status_code(), 200);
        response.json()
    }

    pub async fn open_member(&self, cookie: &str, member_id: Uuid) -> TestResponse {
        self.server
            .post(&format!("/members/{}/open", member_id))
            .add_header("Cookie", cookie)
            .await
    }
}
