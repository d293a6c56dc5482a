//! Upload → convert sequencing for a single document.
//!
//! Each request runs the stages in order and stops at the first failure:
//!
//! ```text
//! Received ──▶ FolderResolved ──▶ Uploaded ──▶ Converted ──▶ Streamed
//!    │               │                │             │
//!    └───────────────┴────────────────┴─────────────┴──▶ Failed(reason)
//! ```
//!
//! 1. [`staging`]: the inbound body is written to a transient file
//! 2. the destination folder is looked up (or created) in the drive
//! 3. an upload session is opened and the file pushed in chunks
//! 4. Graph renders the uploaded item as PDF
//! 5. [`output`]: the PDF is staged locally, then streamed to the caller
//!
//! Both transient files are owned values; dropping them deletes the file, so
//! every exit path cleans up without explicit bookkeeping. Nothing retries.

pub mod output;
pub mod staging;

use crate::config::ServiceConfig;
use crate::error::MsGraphPdfError;
use crate::graph::{ChunkSize, GraphClient, TargetFormat};
use crate::progress::ProgressCallback;
use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub use output::ConvertedFile;
pub use staging::{sanitize_file_name, StagedUpload};

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    FolderResolved,
    Uploaded,
    Converted,
    Streamed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Received => "received",
            PipelineStage::FolderResolved => "folder-resolved",
            PipelineStage::Uploaded => "uploaded",
            PipelineStage::Converted => "converted",
            PipelineStage::Streamed => "streamed",
        })
    }
}

/// Converts documents by round-tripping them through a Graph drive.
///
/// Built once and shared; every method takes `&self` and keeps all
/// per-request state on the stack.
#[derive(Clone)]
pub struct ConversionPipeline {
    client: Arc<GraphClient>,
    drive_id: String,
    folder_name: String,
    chunk_size: ChunkSize,
    staging_dir: PathBuf,
    max_upload_bytes: u64,
    format: TargetFormat,
    progress: Option<ProgressCallback>,
}

impl ConversionPipeline {
    /// Create a pipeline targeting the drive and folder named in `config`.
    pub fn new(client: Arc<GraphClient>, config: &ServiceConfig) -> Result<Self, MsGraphPdfError> {
        config.require_upload_target()?;
        Ok(Self {
            client,
            drive_id: config.drive_id.clone(),
            folder_name: config.upload_directory.clone(),
            chunk_size: config.chunk_size,
            staging_dir: config.staging_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
            format: TargetFormat::Pdf,
            progress: None,
        })
    }

    /// Report chunk progress to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Render into `format` instead of PDF.
    pub fn with_format(mut self, format: TargetFormat) -> Self {
        self.format = format;
        self
    }

    pub fn client(&self) -> &Arc<GraphClient> {
        &self.client
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Write an inbound body to the staging directory.
    pub async fn stage<S, E>(&self, file_name: &str, body: S) -> Result<StagedUpload, MsGraphPdfError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        staging::stage_stream(&self.staging_dir, file_name, body, self.max_upload_bytes).await
    }

    /// Upload `upload`, convert it and stage the rendition locally.
    pub async fn run(&self, upload: &StagedUpload) -> Result<ConvertedFile, MsGraphPdfError> {
        let started = Instant::now();
        let mut stage = PipelineStage::Received;
        info!(
            "{}: '{}' ({} bytes)",
            stage,
            upload.file_name(),
            upload.len()
        );

        match self.run_stages(upload, &mut stage).await {
            Ok(converted) => {
                info!(
                    "Converted '{}' to '{}' ({} bytes) in {}ms",
                    upload.file_name(),
                    converted.file_name(),
                    converted.len(),
                    started.elapsed().as_millis()
                );
                Ok(converted)
            }
            Err(e) => {
                warn!(
                    "Pipeline for '{}' failed after stage '{}': {}",
                    upload.file_name(),
                    stage,
                    e
                );
                Err(e)
            }
        }
    }

    /// Stage `body` and run the pipeline on it. The staged upload is removed
    /// before this returns.
    pub async fn convert_stream<S, E>(
        &self,
        file_name: &str,
        body: S,
    ) -> Result<ConvertedFile, MsGraphPdfError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let staged = self.stage(file_name, body).await?;
        self.run(&staged).await
    }

    async fn run_stages(
        &self,
        upload: &StagedUpload,
        stage: &mut PipelineStage,
    ) -> Result<ConvertedFile, MsGraphPdfError> {
        if upload.is_empty() {
            return Err(MsGraphPdfError::EmptyUpload {
                file_name: upload.file_name().to_string(),
            });
        }

        let folder = self
            .client
            .resolve_or_create_folder(&self.drive_id, &self.folder_name)
            .await?;
        *stage = PipelineStage::FolderResolved;
        info!("{}: folder '{}' ({})", stage, folder.name, folder.id);

        let session = self
            .client
            .create_upload_session(&self.drive_id, &folder.id, upload.file_name())
            .await?;
        let item_id = self
            .client
            .upload_chunks(
                &session,
                upload.path(),
                self.chunk_size,
                self.progress.as_deref(),
            )
            .await?;
        *stage = PipelineStage::Uploaded;
        info!("{}: item {}", stage, item_id);

        let content = self
            .client
            .convert_to_format(&self.drive_id, &item_id, self.format)
            .await?;
        let converted =
            ConvertedFile::download(&self.staging_dir, upload.file_name(), content).await?;
        *stage = PipelineStage::Converted;
        info!("{}: {} bytes of {}", stage, converted.len(), self.format);

        Ok(converted)
    }
}

impl fmt::Debug for ConversionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionPipeline")
            .field("base_url", &self.client.base_url().as_str())
            .field("drive_id", &self.drive_id)
            .field("folder_name", &self.folder_name)
            .field("chunk_size", &self.chunk_size)
            .field("staging_dir", &self.staging_dir)
            .field("format", &self.format)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn UploadProgressCallback>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(PipelineStage::Received.to_string(), "received");
        assert_eq!(PipelineStage::FolderResolved.to_string(), "folder-resolved");
        assert_eq!(PipelineStage::Streamed.to_string(), "streamed");
    }
}
