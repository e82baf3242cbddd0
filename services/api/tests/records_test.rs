//! End-to-end tests over the full router.

mod helpers;

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use bytes::Bytes;
use family_records_core::domain::Role;
use family_records_core::ports::{DatabaseService, PortError, PortResult, StorageService};
use helpers::{session_cookie, spawn_app, spawn_app_with, BASE_URL, PASSWORD};
use std::sync::Arc;
use std::time::Duration;

/// A document store whose backend is down.
struct OfflineStorage;

#[async_trait]
impl StorageService for OfflineStorage {
    async fn upload(&self, _data: Bytes, _file_name: &str, _content_type: &str) -> PortResult<String> {
        Err(PortError::Storage("bucket offline".to_string()))
    }

    async fn get_signed_url(&self, _storage_key: &str, _expires_in: Duration) -> PortResult<String> {
        Err(PortError::Storage("bucket offline".to_string()))
    }
}

#[tokio::test]
async fn unknown_email_gets_invalid_credentials() {
    let app = spawn_app().await;

    let response = app.login("nobody@example.com", PASSWORD).await;
    assert_eq!(response.status_code(), 401);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Invalid credentials");
    assert!(response.maybe_header("set-cookie").is_none());
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = spawn_app().await;

    let response = app.server.get("/view").await;
    assert_eq!(response.status_code(), 401);

    let response = app
        .server
        .get("/view")
        .add_header("Cookie", "session=not-a-real-session")
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn register_then_sign_in_lands_on_the_member_list() {
    let app = spawn_app().await;
    let credentials = serde_json::json!({ "email": "parent@example.com", "password": PASSWORD });

    let response = app.server.post("/auth/register").json(&credentials).await;
    assert_eq!(response.status_code(), 201);
    let body: serde_json::Value = response.json();
    assert_eq!(body["role"], "admin");

    let response = app.server.post("/auth/register").json(&credentials).await;
    assert_eq!(response.status_code(), 401);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Email already registered");

    let response = app.login("parent@example.com", PASSWORD).await;
    assert_eq!(response.status_code(), 200);
    let cookie_header = response.header("set-cookie");
    let cookie_header = cookie_header.to_str().unwrap();
    assert!(cookie_header.contains("HttpOnly"));
    assert!(cookie_header.contains("SameSite=Lax"));

    let view = app.view(&session_cookie(&response), "").await;
    assert_eq!(view["view"], "member_list");
    assert_eq!(view["can_add_members"], true);
    assert_eq!(view["notice"], "No family members yet");
}

#[tokio::test]
async fn added_member_appears_first_with_no_birth_date() {
    let app = spawn_app().await;
    let cookie = app.sign_in_as("admin@example.com", Role::Admin).await;

    app.add_member(&cookie, "John Doe").await;
    app.add_member(&cookie, "Jane Doe").await;

    let view = app.view(&cookie, "").await;
    assert_eq!(view["members"][0]["full_name"], "Jane Doe");
    assert_eq!(view["members"][0]["birth_date"], "Not provided");
    assert_eq!(view["members"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn viewer_cannot_write_but_can_browse() {
    let app = spawn_app().await;
    let admin = app.sign_in_as("admin@example.com", Role::Admin).await;
    let member_id = app.add_member(&admin, "Jane Doe").await;
    let upload = app
        .upload(&admin, member_id, "Flu", "flu.pdf", "application/pdf")
        .await;
    assert_eq!(upload.status_code(), 201);

    let viewer = app.sign_in_as("viewer@example.com", Role::Viewer).await;
    let response = app
        .server
        .post("/members")
        .add_header("Cookie", &viewer)
        .json(&serde_json::json!({ "full_name": "Someone" }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .upload(&viewer, member_id, "Flu", "other.pdf", "application/pdf")
        .await;
    assert_eq!(response.status_code(), 403);

    assert_eq!(app.open_member(&viewer, member_id).await.status_code(), 204);
    let view = app.view(&viewer, "").await;
    assert_eq!(view["view"], "member_detail");
    assert!(view["upload_form"].is_null());
    assert_eq!(view["documents"].as_array().unwrap().len(), 1);
    assert_eq!(view["documents"][0]["description"], "uploaded in a test");
}

#[tokio::test]
async fn uploads_are_filtered_and_downloadable() {
    let app = spawn_app().await;
    let cookie = app.sign_in_as("admin@example.com", Role::Admin).await;
    let member_id = app.add_member(&cookie, "Jane Doe").await;

    for (condition, file_name, mime) in [
        ("Flu", "flu.pdf", "application/pdf"),
        ("Flu", "throat.png", "image/png"),
        ("Checkup", "annual.pdf", "application/pdf"),
    ] {
        let response = app.upload(&cookie, member_id, condition, file_name, mime).await;
        assert_eq!(response.status_code(), 201);
    }

    app.open_member(&cookie, member_id).await;
    let view = app
        .view(&cookie, "?condition=Flu&mime_type=application/pdf")
        .await;
    let documents = view["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["file_name"], "flu.pdf");
    assert_eq!(
        view["filter_options"]["conditions"],
        serde_json::json!(["Checkup", "Flu"])
    );

    let view = app.view(&cookie, "?q=THROAT").await;
    assert_eq!(view["documents"].as_array().unwrap().len(), 1);

    let url = documents[0]["download_url"].as_str().unwrap();
    let path = url.strip_prefix(BASE_URL).unwrap();
    let response = app.server.get(path).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("content-type"), "application/pdf");
    assert_eq!(response.text(), "contents of flu.pdf");

    let forged = format!("{}0", path.trim_end_matches(char::is_alphanumeric));
    let response = app.server.get(&forged).await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn invalid_upload_is_rejected_inline() {
    let app = spawn_app().await;
    let cookie = app.sign_in_as("admin@example.com", Role::Admin).await;
    let member_id = app.add_member(&cookie, "Jane Doe").await;

    let response = app
        .upload(&cookie, member_id, "Flu", "notes.txt", "text/plain")
        .await;
    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Only PDF, PNG and JPEG files are accepted");

    let response = app
        .upload(&cookie, member_id, "", "scan.pdf", "application/pdf")
        .await;
    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Condition is required");
}

#[tokio::test]
async fn deleted_member_is_reported_then_the_list_returns() {
    let app = spawn_app().await;
    let admin = app.sign_in_as("admin@example.com", Role::Admin).await;
    let member_id = app.add_member(&admin, "Jane Doe").await;
    app.add_member(&admin, "John Doe").await;

    let viewer = app.sign_in_as("viewer@example.com", Role::Viewer).await;
    app.open_member(&viewer, member_id).await;

    let response = app
        .server
        .delete(&format!("/members/{}", member_id))
        .add_header("Cookie", &admin)
        .await;
    assert_eq!(response.status_code(), 204);

    let view = app.view(&viewer, "").await;
    assert_eq!(view["view"], "member_detail");
    assert_eq!(view["notice"], "Member not found");

    let view = app.view(&viewer, "").await;
    assert_eq!(view["view"], "member_list");
    assert_eq!(view["members"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn view_selector_rejects_the_sign_in_view() {
    let app = spawn_app().await;
    let cookie = app.sign_in_as("viewer@example.com", Role::Viewer).await;

    let response = app
        .server
        .put("/view")
        .add_header("Cookie", &cookie)
        .json(&serde_json::json!({ "view": "sign_in" }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .server
        .put("/view")
        .add_header("Cookie", &cookie)
        .json(&serde_json::json!({ "view": "add_member" }))
        .await;
    assert_eq!(response.status_code(), 204);

    let view = app.view(&cookie, "").await;
    assert_eq!(view["view"], "add_member");
    assert_eq!(view["notice"], "Only administrators can add family members");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = spawn_app().await;
    let cookie = app.sign_in_as("admin@example.com", Role::Admin).await;

    let response = app
        .server
        .post("/auth/logout")
        .add_header("Cookie", &cookie)
        .await;
    assert_eq!(response.status_code(), 200);
    assert!(response
        .header("set-cookie")
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let response = app.server.get("/view").add_header("Cookie", &cookie).await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn storage_outage_is_reported_and_writes_no_record() {
    let app = spawn_app_with(&[], Some(Arc::new(OfflineStorage))).await;
    let cookie = app.sign_in_as("admin@example.com", Role::Admin).await;
    let member_id = app.add_member(&cookie, "Jane Doe").await;

    let response = app
        .upload(&cookie, member_id, "Flu", "flu.pdf", "application/pdf")
        .await;
    assert_eq!(response.status_code(), 502);
    let body: serde_json::Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Document storage is unavailable"));
    assert!(app
        .db
        .list_documents_for_member(member_id)
        .await
        .unwrap()
        .is_empty());

    // The session carries on.
    app.open_member(&cookie, member_id).await;
    let view = app.view(&cookie, "").await;
    assert_eq!(view["view"], "member_detail");
    assert_eq!(view["notice"], "No documents uploaded yet");
}

#[tokio::test]
async fn viewer_upload_is_forbidden_before_the_form_is_read() {
    let app = spawn_app().await;
    let admin = app.sign_in_as("admin@example.com", Role::Admin).await;
    let member_id = app.add_member(&admin, "Jane Doe").await;
    let viewer = app.sign_in_as("viewer@example.com", Role::Viewer).await;

    let part = Part::bytes(Bytes::from_static(b"%PDF-1.4"))
        .file_name("scan.pdf")
        .mime_type("application/pdf");
    let form = MultipartForm::new()
        .add_text("doc_date", "last tuesday")
        .add_text("condition", "Flu")
        .add_part("file", part);

    let response = app.post_form(&viewer, member_id, form).await;
    assert_eq!(response.status_code(), 403);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Only administrators can upload documents");
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let app = spawn_app_with(&[("MAX_UPLOAD_BYTES", "1024")], None).await;
    let cookie = app.sign_in_as("admin@example.com", Role::Admin).await;
    let member_id = app.add_member(&cookie, "Jane Doe").await;

    let part = Part::bytes(Bytes::from(vec![0u8; 8 * 1024]))
        .file_name("big.pdf")
        .mime_type("application/pdf");
    let form = MultipartForm::new()
        .add_text("condition", "Flu")
        .add_part("file", part);

    let response = app.post_form(&cookie, member_id, form).await;
    assert_eq!(response.status_code(), 413);
    assert!(app
        .db
        .list_documents_for_member(member_id)
        .await
        .unwrap()
        .is_empty());
}
