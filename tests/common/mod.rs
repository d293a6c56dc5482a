//! Shared fixtures: a wiremock stand-in for Graph plus helpers to wire the
//! real client and pipeline against it.

#![allow(dead_code)]

use msgraph_pdf::{
    ConversionPipeline, GraphClient, ServiceConfig, ServiceIdentity, StaticTokenProvider,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DRIVE: &str = "drive-1";
pub const FOLDER_NAME: &str = "converted";
pub const FOLDER_ID: &str = "folder-1";
pub const ITEM_ID: &str = "item-1";
pub const TOKEN: &str = "test-token";
pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

// ── Wiring ───────────────────────────────────────────────────────────────────

pub fn config(server: &MockServer, staging: &Path) -> ServiceConfig {
    ServiceConfig::builder(ServiceIdentity::new("client", "secret", "tenant"))
        .drive_id(DRIVE)
        .upload_directory(FOLDER_NAME)
        .graph_base_url(server.uri())
        .staging_dir(staging)
        .build()
        .unwrap()
}

pub fn client(server: &MockServer) -> Arc<GraphClient> {
    Arc::new(
        GraphClient::new(
            reqwest::Client::new(),
            &server.uri(),
            Arc::new(StaticTokenProvider::new(TOKEN)),
        )
        .unwrap(),
    )
}

/// Route library logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn pipeline(server: &MockServer, staging: &Path) -> ConversionPipeline {
    init_tracing();
    ConversionPipeline::new(client(server), &config(server, staging)).unwrap()
}

/// Files currently present in `dir`.
pub fn staged_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

pub fn upload_url(server: &MockServer) -> String {
    format!("{}/upload/session-1", server.uri())
}

pub fn children_path() -> String {
    format!("/drives/{DRIVE}/items/root/children")
}

pub fn session_path(file_name: &str) -> String {
    format!("/drives/{DRIVE}/items/{FOLDER_ID}:/{file_name}:/createUploadSession")
}

pub fn content_path(item_id: &str) -> String {
    format!("/drives/{DRIVE}/items/{item_id}/content")
}

// ── Canned Graph behaviour ──────────────────────────────────────────────────

/// Root children already contain the upload folder.
pub async fn mount_existing_folder(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(children_path()))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": "other", "name": "Documents", "folder": { "childCount": 3 } },
                { "id": FOLDER_ID, "name": FOLDER_NAME, "folder": { "childCount": 0 } }
            ]
        })))
        .mount(server)
        .await;
}

/// Session creation for `file_name` plus a single-chunk `PUT` that completes it.
pub async fn mount_single_chunk_upload(server: &MockServer, file_name: &str) {
    mount_upload_session(server, file_name).await;
    Mock::given(method("PUT"))
        .and(path("/upload/session-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": ITEM_ID,
            "name": file_name,
        })))
        .mount(server)
        .await;
}

pub async fn mount_upload_session(server: &MockServer, file_name: &str) {
    Mock::given(method("POST"))
        .and(path(session_path(file_name)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uploadUrl": upload_url(server),
            "expirationDateTime": "2030-01-01T00:00:00Z",
            "nextExpectedRanges": ["0-"]
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// `GET …/content?format=pdf` answers with `body`.
pub async fn mount_conversion(server: &MockServer, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(content_path(ITEM_ID)))
        .and(query_param("format", "pdf"))
        .and(header("Accept", "application/pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

/// Everything a successful `report.docx` conversion needs.
pub async fn mount_happy_path(server: &MockServer) {
    mount_existing_folder(server).await;
    mount_single_chunk_upload(server, "report.docx").await;
    mount_conversion(server, PDF_BYTES).await;
}
