//! Transient storage for inbound documents.
//!
//! An upload is written to a [`tempfile`] in the staging directory before any
//! remote call is made. The file is owned by [`StagedUpload`] and removed when
//! that value is dropped, whichever way the request ends.

use crate::error::MsGraphPdfError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Name used when the client sent none we can use.
const FALLBACK_FILE_NAME: &str = "upload";

/// Where the bytes of a staged upload live.
enum UploadSource {
    /// Written by us; deleted on drop.
    Staged(TempPath),
    /// A file the caller already had on disk; left untouched.
    Local(PathBuf),
}

/// A document ready to be pushed to Graph.
pub struct StagedUpload {
    file_name: String,
    len: u64,
    source: UploadSource,
}

impl StagedUpload {
    /// Wrap an existing local file without copying it.
    pub async fn local(path: impl Into<PathBuf>) -> Result<Self, MsGraphPdfError> {
        let path = path.into();
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|source| MsGraphPdfError::StagedRead {
                path: path.clone(),
                source,
            })?;
        if !meta.is_file() {
            return Err(MsGraphPdfError::StagedRead {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }
        let file_name = sanitize_file_name(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .as_deref()
                .unwrap_or(FALLBACK_FILE_NAME),
        );
        Ok(Self {
            file_name,
            len: meta.len(),
            source: UploadSource::Local(path),
        })
    }

    /// Name the document will have in the drive.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path of the bytes on disk.
    pub fn path(&self) -> &Path {
        match &self.source {
            UploadSource::Staged(p) => p,
            UploadSource::Local(p) => p,
        }
    }

    /// True when dropping this value deletes the file.
    pub fn is_transient(&self) -> bool {
        matches!(self.source, UploadSource::Staged(_))
    }
}

/// Write `body` into a new transient file under `dir`.
///
/// Fails with [`MsGraphPdfError::UploadTooLarge`] as soon as more than
/// `max_bytes` have arrived; the partial file is removed.
pub async fn stage_stream<S, E>(
    dir: &Path,
    file_name: &str,
    body: S,
    max_bytes: u64,
) -> Result<StagedUpload, MsGraphPdfError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let file_name = sanitize_file_name(file_name);
    let staging_err = |source| MsGraphPdfError::Staging {
        dir: dir.to_path_buf(),
        source,
    };

    let named = tempfile::Builder::new()
        .prefix("msgraph-pdf-upload-")
        .suffix(&extension_suffix(&file_name))
        .tempfile_in(dir)
        .map_err(staging_err)?;
    let (std_file, temp_path) = named.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let mut body = std::pin::pin!(body);
    let mut len = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| MsGraphPdfError::MalformedRequest(e.to_string()))?;
        len += chunk.len() as u64;
        if len > max_bytes {
            return Err(MsGraphPdfError::UploadTooLarge { limit: max_bytes });
        }
        file.write_all(&chunk).await.map_err(staging_err)?;
    }
    file.flush().await.map_err(staging_err)?;

    debug!(
        "Staged '{}' ({} bytes) at {}",
        file_name,
        len,
        temp_path.display()
    );

    Ok(StagedUpload {
        file_name,
        len,
        source: UploadSource::Staged(temp_path),
    })
}

/// Reduce a client-supplied name to something Graph accepts as a file name.
///
/// Directory components are dropped and characters Graph forbids
/// (`" * : < > ? / \ |`) or control characters become `_`.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '"' | '*' | ':' | '<' | '>' | '?' | '/' | '\\' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').to_string();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

/// `".docx"` for `"report.docx"`, empty when there is no extension.
fn extension_suffix(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
