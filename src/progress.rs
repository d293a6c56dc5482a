//! Progress-callback trait for chunked uploads.
//!
//! Inject an [`Arc<dyn UploadProgressCallback>`] into
//! [`crate::pipeline::ConversionPipeline::with_progress`] (or pass one to
//! [`crate::graph::GraphClient::upload_chunks`] directly) to receive an event
//! at every chunk boundary.
//!
//! Callbacks are invoked synchronously between chunk requests, so a slow
//! implementation slows the upload down. Forward to a channel if the work is
//! expensive.
//!
//! # Example
//!
//! ```rust
//! use msgraph_pdf::UploadProgressCallback;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct HighWaterMark(AtomicU64);
//!
//! impl UploadProgressCallback for HighWaterMark {
//!     fn on_chunk_uploaded(&self, bytes_sent: u64, _total_bytes: u64) {
//!         self.0.fetch_max(bytes_sent, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::sync::Arc;
use tracing::info;

/// Called by the upload loop as the file is pushed to Graph.
///
/// All methods have no-op defaults so implementers only override what they
/// care about.
pub trait UploadProgressCallback: Send + Sync {
    /// Called once after the upload session is open, before the first chunk.
    fn on_upload_start(&self, file_name: &str, total_bytes: u64) {
        let _ = (file_name, total_bytes);
    }

    /// Called after each chunk is accepted.
    ///
    /// # Arguments
    /// * `bytes_sent`: cumulative bytes acknowledged so far
    /// * `total_bytes`: size of the whole file
    fn on_chunk_uploaded(&self, bytes_sent: u64, total_bytes: u64) {
        let _ = (bytes_sent, total_bytes);
    }

    /// Called once when Graph returns the created item.
    fn on_upload_complete(&self, item_id: &str, total_bytes: u64) {
        let _ = (item_id, total_bytes);
    }

    /// Called once if the upload is abandoned.
    fn on_upload_error(&self, bytes_sent: u64, total_bytes: u64, error: &str) {
        let _ = (bytes_sent, total_bytes, error);
    }
}

/// Does nothing. Used when no observer is configured.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Logs every chunk at `info` as "Uploaded X of Y bytes (Z%)".
///
/// This is what the HTTP service installs by default.
pub struct LoggingProgressCallback;

impl UploadProgressCallback for LoggingProgressCallback {
    fn on_chunk_uploaded(&self, bytes_sent: u64, total_bytes: u64) {
        info!(
            "Uploaded {} of {} bytes ({:.2}%)",
            bytes_sent,
            total_bytes,
            percent(bytes_sent, total_bytes)
        );
    }
}

/// Share of `total` covered by `sent`, in percent. An empty total counts as done.
pub fn percent(sent: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    sent as f64 / total as f64 * 100.0
}

/// Convenience alias for the shared observer handle.
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;
