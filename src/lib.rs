//! # msgraph-pdf
//!
//! Convert office documents to PDF by round-tripping them through a
//! Microsoft Graph drive.
//!
//! ## Why this crate?
//!
//! OneDrive and SharePoint already know how to render Word, Excel and
//! PowerPoint files as PDF. Instead of shipping a local office suite, this
//! crate uploads the document into a drive folder and asks Graph for the
//! `?format=pdf` rendition, then hands the bytes back. It can run as a small
//! HTTP service or be called directly as a library.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Stage    write the incoming body to a transient file
//!  ├─ 2. Folder   look up (or create) the upload folder in the drive
//!  ├─ 3. Upload   open an upload session, push 320 KiB-aligned chunks
//!  ├─ 4. Convert  GET …/content?format=pdf  (Accept: application/pdf)
//!  └─ 5. Deliver  stage the PDF, stream it out, delete both transients
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use msgraph_pdf::{ConversionPipeline, GraphClient, ServiceConfig, StagedUpload};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // AZURE_CLIENT_ID / AZURE_CLIENT_SECRET / AZURE_TENANT_ID / DRIVE_ID / UPLOAD_DIRECTORY
//!     let config = ServiceConfig::from_env()?;
//!     let client = Arc::new(GraphClient::from_config(&config)?);
//!     let pipeline = ConversionPipeline::new(client, &config)?;
//!
//!     let upload = StagedUpload::local("report.docx").await?;
//!     let pdf = pipeline.run(&upload).await?;
//!     pdf.persist(std::path::Path::new("report.pdf")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Running the service
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), msgraph_pdf::MsGraphPdfError> {
//! let config = msgraph_pdf::ServiceConfig::from_env()?;
//! msgraph_pdf::server::serve(&config).await
//! # }
//! ```
//!
//! | Route            | Success                          | Failure                      |
//! |------------------|----------------------------------|------------------------------|
//! | `POST /convert`  | `200 application/pdf`            | `400`/`500` `{"error": ...}` |
//! | `GET /drives`    | `200 {"drives": ["<id>", ...]}`  | `500 {"error": ...}`         |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `msgraph-pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! msgraph-pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod auth;
pub mod config;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod progress;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use auth::{ClientSecretCredential, StaticTokenProvider, TokenProvider};
pub use config::{ServiceConfig, ServiceConfigBuilder, ServiceIdentity};
pub use error::{ErrorCategory, MsGraphPdfError, Result};
pub use graph::{ChunkSize, ConvertedContent, FolderHandle, GraphClient, TargetFormat, UploadSession};
pub use pipeline::{ConversionPipeline, ConvertedFile, PipelineStage, StagedUpload};
pub use progress::{
    LoggingProgressCallback, NoopProgressCallback, ProgressCallback, UploadProgressCallback,
};
pub use server::{create_router, AppState};
