//! Error types for the msgraph-pdf library.
//!
//! Every failure the service can produce is a [`MsGraphPdfError`]. Variants
//! are grouped into an [`ErrorCategory`] so the HTTP layer can map them to a
//! status code without matching on individual variants:
//!
//! | Category     | Cause                                   | HTTP |
//! |--------------|-----------------------------------------|------|
//! | `Validation` | the caller sent something unusable      | 400  |
//! | `Io`         | local staging or cleanup failed         | 500  |
//! | `Auth`       | no access token could be obtained       | 500  |
//! | `Remote`     | Graph rejected or failed a request      | 500  |
//! | `Config`     | the service is misconfigured            | 500  |
//!
//! Nothing in the pipeline retries. The first error short-circuits the
//! remaining stages and its `Display` text is what the caller sees.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = MsGraphPdfError> = std::result::Result<T, E>;

/// All errors returned by the msgraph-pdf library.
#[derive(Debug, Error)]
pub enum MsGraphPdfError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The multipart body had no `file` field.
    #[error("No file uploaded")]
    NoFileUploaded,

    /// The uploaded file contained zero bytes.
    #[error("Uploaded file '{file_name}' is empty")]
    EmptyUpload { file_name: String },

    /// The uploaded file exceeded the configured size limit.
    #[error("Uploaded file exceeds the {limit} byte limit")]
    UploadTooLarge { limit: u64 },

    /// The request body could not be parsed.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    // ── Local I/O errors ──────────────────────────────────────────────────
    /// Writing a transient file to the staging directory failed.
    #[error("Failed to stage file in '{dir}': {source}")]
    Staging {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a staged file back failed.
    #[error("Failed to read staged file '{path}': {source}")]
    StagedRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the converted output failed.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Binding or running the HTTP listener failed.
    #[error("Server error on {addr}: {source}")]
    Serve {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    // ── Authentication errors ─────────────────────────────────────────────
    /// The identity provider refused or failed the token request.
    #[error("Failed to acquire access token for tenant '{tenant}': {detail}")]
    Auth { tenant: String, detail: String },

    // ── Remote (Graph) errors ─────────────────────────────────────────────
    /// Graph answered with a non-success status.
    #[error("failed to {operation}: HTTP {status}: {message}")]
    Remote {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset…).
    #[error("failed to {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Graph answered 2xx but the payload was not what the protocol promises.
    #[error("failed to {operation}: unexpected response: {detail}")]
    UnexpectedResponse {
        operation: &'static str,
        detail: String,
    },

    /// The chunked upload ended without Graph returning the created item.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// A chunk size that the upload-session protocol would reject.
    #[error("Invalid chunk size {size}: must be a non-zero multiple of {alignment} bytes and at most {max} bytes")]
    InvalidChunkSize { size: u64, alignment: u64, max: u64 },

    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required environment variable is unset or empty.
    #[error("Missing required environment variable {0}")]
    MissingEnv(&'static str),
}

/// Coarse classification used to pick an HTTP status and log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Io,
    Auth,
    Remote,
    Config,
}

impl MsGraphPdfError {
    /// Which family of failure this is.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoFileUploaded
            | Self::EmptyUpload { .. }
            | Self::UploadTooLarge { .. }
            | Self::MalformedRequest(_) => ErrorCategory::Validation,
            Self::Staging { .. }
            | Self::StagedRead { .. }
            | Self::OutputWriteFailed { .. }
            | Self::Serve { .. } => ErrorCategory::Io,
            Self::Auth { .. } => ErrorCategory::Auth,
            Self::Remote { .. }
            | Self::Transport { .. }
            | Self::UnexpectedResponse { .. }
            | Self::UploadFailed(_) => ErrorCategory::Remote,
            Self::InvalidChunkSize { .. } | Self::InvalidConfig(_) | Self::MissingEnv(_) => {
                ErrorCategory::Config
            }
        }
    }

    /// True when the caller, not the service, is at fault.
    pub fn is_client_error(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    pub(crate) fn transport(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Transport { operation, source }
    }

    pub(crate) fn unexpected(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            operation,
            detail: detail.into(),
        }
    }
}
