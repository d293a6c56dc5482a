//! Server-side format conversion of a stored item.
//!
//! Graph renders an item into another format when its content is fetched with
//! `?format=<fmt>`. The response is normally a redirect to a short-lived
//! download URL, which reqwest follows (dropping the bearer token on the
//! cross-host hop).
//!
//! The first bytes of the rendition are compared with the format's magic
//! number. A mismatch is only logged: the bytes still go back to the caller.

use super::GraphClient;
use crate::error::MsGraphPdfError;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use std::fmt;
use tracing::{debug, warn};

/// How many leading bytes are kept for the signature check and the warning.
const SNIFF_LEN: usize = 16;

/// Formats Graph can render a stored item into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetFormat {
    #[default]
    Pdf,
    Html,
}

impl TargetFormat {
    /// Value of the `format` query parameter.
    pub fn query_value(self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Html => "html",
        }
    }

    /// MIME type sent in `Accept` and returned to HTTP callers.
    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::Pdf => "application/pdf",
            TargetFormat::Html => "text/html",
        }
    }

    /// File extension for the rendition, without the dot.
    pub fn extension(self) -> &'static str {
        self.query_value()
    }

    /// Magic number every valid rendition starts with, if the format has one.
    pub fn signature(self) -> Option<&'static [u8]> {
        match self {
            TargetFormat::Pdf => Some(b"%PDF"),
            TargetFormat::Html => None,
        }
    }

    /// Whether `head` starts with this format's signature.
    ///
    /// Formats without a signature always match. Fewer bytes than the
    /// signature never match.
    pub fn signature_matches(self, head: &[u8]) -> bool {
        match self.signature() {
            Some(magic) => head.starts_with(magic),
            None => true,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

/// A rendition being downloaded from Graph.
///
/// Pull it with [`ConvertedContent::next_chunk`] until `None`.
pub struct ConvertedContent {
    response: reqwest::Response,
    format: TargetFormat,
    head: Vec<u8>,
    checked: bool,
}

impl ConvertedContent {
    fn new(response: reqwest::Response, format: TargetFormat) -> Self {
        Self {
            response,
            format,
            head: Vec::with_capacity(SNIFF_LEN),
            checked: false,
        }
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// Length announced by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Next piece of the body, or `None` at the end.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, MsGraphPdfError> {
        let chunk = self
            .response
            .chunk()
            .await
            .map_err(|e| MsGraphPdfError::transport("download converted file", e))?;

        match &chunk {
            Some(bytes) => self.sniff(bytes),
            None => self.check_signature(),
        }
        Ok(chunk)
    }

    fn sniff(&mut self, bytes: &[u8]) {
        if self.checked {
            return;
        }
        let want = SNIFF_LEN - self.head.len();
        self.head.extend_from_slice(&bytes[..want.min(bytes.len())]);
        if self.head.len() >= SNIFF_LEN {
            self.check_signature();
        }
    }

    fn check_signature(&mut self) {
        if self.checked {
            return;
        }
        self.checked = true;
        if self.head.is_empty() {
            warn!("Converted {} response is empty", self.format);
            return;
        }
        if !self.format.signature_matches(&self.head) {
            warn!(
                "Response might not be a {}. First bytes: {}",
                self.format.query_value().to_uppercase(),
                hex_prefix(&self.head)
            );
        }
    }
}

impl fmt::Debug for ConvertedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertedContent")
            .field("format", &self.format)
            .field("content_length", &self.content_length())
            .finish()
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl GraphClient {
    /// Ask Graph for `item_id` rendered as `format`.
    pub async fn convert_to_format(
        &self,
        drive_id: &str,
        item_id: &str,
        format: TargetFormat,
    ) -> Result<ConvertedContent, MsGraphPdfError> {
        let mut url = self.endpoint(&["drives", drive_id, "items", item_id, "content"])?;
        url.query_pairs_mut()
            .append_pair("format", format.query_value());

        debug!("Making request to: {}", url);

        let response = self
            .send(
                "convert file",
                self.http().get(url).header(ACCEPT, format.mime_type()),
            )
            .await?;

        Ok(ConvertedContent::new(response, format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_signature() {
        assert!(TargetFormat::Pdf.signature_matches(b"%PDF-1.7\n"));
        assert!(!TargetFormat::Pdf.signature_matches(b"<html>"));
        assert!(!TargetFormat::Pdf.signature_matches(b"%PD"));
    }

    #[test]
    fn html_has_no_signature() {
        assert!(TargetFormat::Html.signature().is_none());
        assert!(TargetFormat::Html.signature_matches(b"anything"));
    }

    #[test]
    fn query_and_mime_values() {
        assert_eq!(TargetFormat::Pdf.query_value(), "pdf");
        assert_eq!(TargetFormat::Pdf.mime_type(), "application/pdf");
        assert_eq!(TargetFormat::default(), TargetFormat::Pdf);
        assert_eq!(TargetFormat::Html.to_string(), "html");
    }

    #[test]
    fn hex_prefix_formats_lowercase() {
        assert_eq!(hex_prefix(b"%PDF"), "25504446");
    }
}
