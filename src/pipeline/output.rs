//! The converted document, staged on disk until it has been delivered.
//!
//! The rendition is written to a transient file in full before anything is
//! sent to the client, so a failure while downloading it turns into an error
//! response instead of a truncated PDF. [`ConvertedFile::into_stream`] then
//! reads it back and removes it when the stream finishes or is dropped.

use super::PipelineStage;
use crate::error::MsGraphPdfError;
use crate::graph::{ConvertedContent, TargetFormat};
use bytes::Bytes;
use futures::Stream;
use std::path::Path;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Read size when streaming the staged rendition back out.
const READ_CHUNK: usize = 64 * 1024;

/// A finished rendition waiting to be delivered.
#[derive(Debug)]
pub struct ConvertedFile {
    path: TempPath,
    file_name: String,
    len: u64,
    format: TargetFormat,
}

impl ConvertedFile {
    /// Download `content` into a new transient file under `dir`.
    pub(crate) async fn download(
        dir: &Path,
        source_name: &str,
        mut content: ConvertedContent,
    ) -> Result<Self, MsGraphPdfError> {
        let format = content.format();
        let named = tempfile::Builder::new()
            .prefix("msgraph-pdf-output-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(dir)
            .map_err(|source| MsGraphPdfError::Staging {
                dir: dir.to_path_buf(),
                source,
            })?;
        let (std_file, path) = named.into_parts();
        let write_err = |source| MsGraphPdfError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::from_std(std_file);
        let mut len = 0u64;
        while let Some(chunk) = content.next_chunk().await? {
            file.write_all(&chunk).await.map_err(write_err)?;
            len += chunk.len() as u64;
        }
        file.flush().await.map_err(write_err)?;
        drop(file);

        Ok(Self {
            path,
            file_name: rendition_name(source_name, format),
            len,
            format,
        })
    }

    /// Suggested name for the delivered file (`report.docx` → `report.pdf`).
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// Where the rendition is staged. Valid only while `self` is alive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the rendition to `dest`, then remove the staged copy.
    ///
    /// The copy goes to a temp file next to `dest` and is renamed into place,
    /// so `dest` never holds a partial file. The temp file is removed if
    /// either step fails.
    pub async fn persist(self, dest: &Path) -> Result<u64, MsGraphPdfError> {
        let write_err = |source| MsGraphPdfError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source,
        };
        let parent = match dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
                parent
            }
            None => Path::new("."),
        };
        let tmp = tempfile::Builder::new()
            .prefix(".msgraph-pdf-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(write_err)?
            .into_temp_path();
        tokio::fs::copy(&self.path, &tmp).await.map_err(write_err)?;
        tmp.persist(dest).map_err(|e| write_err(e.error))?;
        Ok(self.len)
    }

    /// Stream the staged bytes; the file is deleted once the stream is done or dropped.
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        let state = ReadState {
            path: self.path,
            file: None,
            sent: 0,
            done: false,
        };
        futures::stream::unfold(state, |mut st| async move {
            if st.done {
                return None;
            }
            if st.file.is_none() {
                match File::open(&st.path).await {
                    Ok(f) => st.file = Some(f),
                    Err(e) => {
                        st.done = true;
                        return Some((Err(e), st));
                    }
                }
            }
            let file = st.file.as_mut()?;
            let mut buf = vec![0u8; READ_CHUNK];
            match file.read(&mut buf).await {
                Ok(0) => {
                    debug!("{}: {} bytes delivered", PipelineStage::Streamed, st.sent);
                    None
                }
                Ok(n) => {
                    buf.truncate(n);
                    st.sent += n as u64;
                    Some((Ok(Bytes::from(buf)), st))
                }
                Err(e) => {
                    st.done = true;
                    Some((Err(e), st))
                }
            }
        })
    }
}

struct ReadState {
    path: TempPath,
    file: Option<File>,
    sent: u64,
    done: bool,
}

/// Replace the extension of `source_name` with the rendition's.
fn rendition_name(source_name: &str, format: TargetFormat) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}.{}", format.extension())
}
