//! Resumable upload sessions.
//!
//! Graph accepts large files through an upload session: one
//! `createUploadSession` call returns a pre-authenticated URL, then the file
//! is `PUT` in consecutive byte ranges. Every range except the last must be a
//! multiple of 320 KiB. Intermediate ranges answer `202 Accepted` with the
//! next expected offset; the final range answers `200`/`201` with the created
//! drive item.
//!
//! The session URL carries its own authorisation, so chunk requests are sent
//! without a bearer token.

use super::models::{
    ConflictBehavior, CreateUploadSession, DriveItem, UploadSessionResponse, UploadableProperties,
};
use super::{ensure_success, read_json, GraphClient};
use crate::error::MsGraphPdfError;
use crate::progress::UploadProgressCallback;
use reqwest::header::CONTENT_RANGE;
use reqwest::StatusCode;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

/// Chunk sizes must be a multiple of this (320 KiB).
pub const CHUNK_ALIGNMENT: u64 = 320 * 1024;

/// Largest range Graph accepts in a single request (60 MiB).
pub const MAX_CHUNK_SIZE: u64 = 60 * 1024 * 1024;

/// Bytes per upload request; always a non-zero multiple of [`CHUNK_ALIGNMENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSize(u64);

impl ChunkSize {
    /// Validate `bytes` against the upload-session alignment rules.
    pub fn new(bytes: u64) -> Result<Self, MsGraphPdfError> {
        if bytes == 0 || bytes % CHUNK_ALIGNMENT != 0 || bytes > MAX_CHUNK_SIZE {
            return Err(MsGraphPdfError::InvalidChunkSize {
                size: bytes,
                alignment: CHUNK_ALIGNMENT,
                max: MAX_CHUNK_SIZE,
            });
        }
        Ok(Self(bytes))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(CHUNK_ALIGNMENT)
    }
}

/// An open upload session for one file.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub upload_url: String,
    pub file_name: String,
    pub expires_at: Option<String>,
}

impl GraphClient {
    /// Open an upload session for `file_name` inside `folder_id`.
    ///
    /// An existing file with the same name is replaced when the upload completes.
    pub async fn create_upload_session(
        &self,
        drive_id: &str,
        folder_id: &str,
        file_name: &str,
    ) -> Result<UploadSession, MsGraphPdfError> {
        let parent = format!("{folder_id}:");
        let child = format!("{file_name}:");
        let url = self.endpoint(&[
            "drives",
            drive_id,
            "items",
            &parent,
            &child,
            "createUploadSession",
        ])?;
        let body = CreateUploadSession {
            item: UploadableProperties {
                conflict_behavior: ConflictBehavior::Replace,
            },
        };

        let response = self
            .send("create upload session", self.http().post(url).json(&body))
            .await?;
        let session: UploadSessionResponse =
            read_json("create upload session", response).await?;

        let upload_url = session.upload_url.ok_or_else(|| {
            MsGraphPdfError::unexpected("create upload session", "response has no uploadUrl")
        })?;

        debug!(
            "Opened upload session for '{}' (expires {:?})",
            file_name, session.expiration_date_time
        );

        Ok(UploadSession {
            upload_url,
            file_name: file_name.to_string(),
            expires_at: session.expiration_date_time,
        })
    }

    /// Push the file at `path` through `session` in `chunk_size` ranges.
    ///
    /// Returns the id of the created drive item. On failure the session is
    /// cancelled (best effort) and the first error is returned; there is no
    /// resume.
    pub async fn upload_chunks(
        &self,
        session: &UploadSession,
        path: &Path,
        chunk_size: ChunkSize,
        progress: Option<&dyn UploadProgressCallback>,
    ) -> Result<String, MsGraphPdfError> {
        let mut transfer = Transfer::default();
        let result = self
            .push_chunks(session, path, chunk_size, progress, &mut transfer)
            .await;

        match result {
            Ok(item_id) => {
                info!(
                    "Uploaded '{}' ({} bytes) as item {}",
                    session.file_name, transfer.total, item_id
                );
                if let Some(cb) = progress {
                    cb.on_upload_complete(&item_id, transfer.total);
                }
                Ok(item_id)
            }
            Err(e) => {
                if let Some(cb) = progress {
                    cb.on_upload_error(transfer.sent, transfer.total, &e.to_string());
                }
                self.cancel_upload_session(session).await;
                Err(e)
            }
        }
    }

    /// Delete the session so Graph can discard any received ranges.
    ///
    /// Failures are logged and swallowed.
    pub async fn cancel_upload_session(&self, session: &UploadSession) {
        match self.http().delete(&session.upload_url).send().await {
            Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND => {
                debug!("Cancelled upload session for '{}'", session.file_name);
            }
            Ok(resp) => warn!(
                "Cancelling upload session for '{}' returned HTTP {}",
                session.file_name,
                resp.status().as_u16()
            ),
            Err(e) => warn!(
                "Cancelling upload session for '{}' failed: {}",
                session.file_name, e
            ),
        }
    }

    async fn push_chunks(
        &self,
        session: &UploadSession,
        path: &Path,
        chunk_size: ChunkSize,
        progress: Option<&dyn UploadProgressCallback>,
        transfer: &mut Transfer,
    ) -> Result<String, MsGraphPdfError> {
        let read_err = |source| MsGraphPdfError::StagedRead {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).await.map_err(read_err)?;
        let total = file.metadata().await.map_err(read_err)?.len();
        transfer.total = total;
        if total == 0 {
            return Err(MsGraphPdfError::UploadFailed(format!(
                "'{}' is empty; upload sessions cannot carry zero bytes",
                session.file_name
            )));
        }

        if let Some(cb) = progress {
            cb.on_upload_start(&session.file_name, total);
        }

        let mut offset = 0u64;
        while offset < total {
            let len = chunk_size.get().min(total - offset);
            let mut chunk = vec![0u8; len as usize];
            file.read_exact(&mut chunk).await.map_err(read_err)?;

            let end = offset + len - 1;
            debug!(
                "PUT bytes {}-{}/{} for '{}'",
                offset, end, total, session.file_name
            );

            let response = self
                .http()
                .put(&session.upload_url)
                .header(CONTENT_RANGE, format!("bytes {offset}-{end}/{total}"))
                .body(chunk)
                .send()
                .await
                .map_err(|e| MsGraphPdfError::transport("upload chunk", e))?;
            let response = ensure_success("upload chunk", response).await?;

            transfer.sent = offset + len;
            if let Some(cb) = progress {
                cb.on_chunk_uploaded(transfer.sent, total);
            }

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => {
                    let item: DriveItem = read_json("upload chunk", response).await?;
                    return Ok(item.id);
                }
                _ => {
                    let state: UploadSessionResponse = read_json("upload chunk", response).await?;
                    let next = next_expected_offset(&state.next_expected_ranges)
                        .unwrap_or(transfer.sent);
                    if next <= offset {
                        return Err(MsGraphPdfError::UploadFailed(format!(
                            "server made no progress past byte {offset} for '{}'",
                            session.file_name
                        )));
                    }
                    if next != transfer.sent {
                        debug!("Server expects offset {} next, seeking", next);
                        file.seek(SeekFrom::Start(next)).await.map_err(read_err)?;
                    }
                    offset = next;
                }
            }
        }

        Err(MsGraphPdfError::UploadFailed(format!(
            "session for '{}' accepted all {} bytes but never returned the created item",
            session.file_name, total
        )))
    }
}

/// Bytes acknowledged so far, reported to the observer on failure.
#[derive(Debug, Default)]
struct Transfer {
    sent: u64,
    total: u64,
}

/// Start of the first range in `nextExpectedRanges` (`["26-"]`, `["0-99", ...]`).
fn next_expected_offset(ranges: &[String]) -> Option<u64> {
    ranges
        .first()
        .and_then(|r| r.split('-').next())
        .and_then(|start| start.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_accepts_multiples() {
        assert_eq!(ChunkSize::new(327_680).unwrap().get(), 327_680);
        assert_eq!(ChunkSize::new(10 * CHUNK_ALIGNMENT).unwrap().get(), 3_276_800);
        assert_eq!(ChunkSize::default().get(), CHUNK_ALIGNMENT);
    }

    #[test]
    fn chunk_size_rejects_misaligned_zero_and_oversized() {
        for bad in [0, 1, 327_679, 327_681, 1_000_000, MAX_CHUNK_SIZE + CHUNK_ALIGNMENT] {
            assert!(
                matches!(ChunkSize::new(bad), Err(MsGraphPdfError::InvalidChunkSize { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn max_chunk_is_itself_aligned() {
        assert!(ChunkSize::new(MAX_CHUNK_SIZE).is_ok());
    }

    #[test]
    fn next_expected_offset_parses_open_and_closed_ranges() {
        assert_eq!(next_expected_offset(&["26-".to_string()]), Some(26));
        assert_eq!(
            next_expected_offset(&["12345-55232".to_string(), "77829-99375".to_string()]),
            Some(12345)
        );
        assert_eq!(next_expected_offset(&[]), None);
        assert_eq!(next_expected_offset(&["garbage".to_string()]), None);
    }
}
