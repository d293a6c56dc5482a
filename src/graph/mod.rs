//! Thin client for the Microsoft Graph drive endpoints.
//!
//! [`GraphClient`] is built once and shared (`Arc`) by every request. It owns
//! the HTTP connection pool and a [`TokenProvider`]; it keeps no per-request
//! state, so concurrent pipelines never contend on it.
//!
//! ## Endpoints used
//!
//! ```text
//! GET  /drives                                              list drives
//! GET  /drives/{d}/items/root/children                      folder lookup
//! POST /drives/{d}/items/root/children                      folder create
//! POST /drives/{d}/items/{folder}:/{name}:/createUploadSession
//! PUT  {uploadUrl}                                          one per chunk
//! GET  /drives/{d}/items/{id}/content?format=pdf            conversion
//! ```
//!
//! Nothing here retries. A failed call surfaces once as a
//! [`MsGraphPdfError`] carrying the HTTP status and Graph's error message.

pub mod convert;
pub mod folder;
pub mod models;
pub mod upload;

use crate::auth::{ClientSecretCredential, TokenProvider};
use crate::config::ServiceConfig;
use crate::error::MsGraphPdfError;
use models::{Collection, Drive, GraphErrorEnvelope};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use convert::{ConvertedContent, TargetFormat};
pub use folder::FolderHandle;
pub use upload::{ChunkSize, UploadSession, CHUNK_ALIGNMENT};

/// Authenticated handle on the Graph API.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl GraphClient {
    /// Create a client for `base_url` (e.g. `https://graph.microsoft.com/v1.0`).
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, MsGraphPdfError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            MsGraphPdfError::InvalidConfig(format!("graph base URL '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(MsGraphPdfError::InvalidConfig(format!(
                "graph base URL '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    /// Build the HTTP client and client-secret credential described by `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, MsGraphPdfError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| MsGraphPdfError::InvalidConfig(format!("HTTP client: {e}")))?;

        let credential =
            ClientSecretCredential::new(http.clone(), config.identity.clone(), &config.authority_host);

        Self::new(http, &config.graph_base_url, Arc::new(credential))
    }

    /// The Graph endpoint this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// List the ids of every drive visible to the service identity.
    ///
    /// Ids are returned in the order Graph reports them, across all pages.
    pub async fn list_drives(&self) -> Result<Vec<String>, MsGraphPdfError> {
        let url = self.endpoint(&["drives"])?;
        let drives: Vec<Drive> = self.get_all_pages("list drives", url).await?;
        debug!("Graph reported {} drives", drives.len());
        Ok(drives.into_iter().map(|d| d.id).collect())
    }

    // ── Request plumbing ─────────────────────────────────────────────────

    /// Join path segments onto the base URL, percent-encoding each one.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, MsGraphPdfError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MsGraphPdfError::InvalidConfig("graph base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Attach a bearer token, send, and turn non-2xx answers into errors.
    pub(crate) async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, MsGraphPdfError> {
        let token = self.tokens.get_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MsGraphPdfError::transport(operation, e))?;
        ensure_success(operation, response).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T, MsGraphPdfError> {
        let response = self.send(operation, self.http.get(url)).await?;
        read_json(operation, response).await
    }

    /// Follow `@odata.nextLink` until the collection is exhausted.
    pub(crate) async fn get_all_pages<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        first: Url,
    ) -> Result<Vec<T>, MsGraphPdfError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let page: Collection<T> = self.get_json(operation, url).await?;
            items.extend(page.value);
            if let Some(link) = page.next_link {
                let url = Url::parse(&link).map_err(|e| {
                    MsGraphPdfError::unexpected(operation, format!("bad nextLink '{link}': {e}"))
                })?;
                next = Some(url);
            }
        }
        Ok(items)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Pass 2xx responses through; read the body of anything else into an error.
pub(crate) async fn ensure_success(
    operation: &'static str,
    response: Response,
) -> Result<Response, MsGraphPdfError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MsGraphPdfError::Remote {
        operation,
        status: status.as_u16(),
        message: error_message(&body, status),
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, MsGraphPdfError> {
    response
        .json::<T>()
        .await
        .map_err(|e| MsGraphPdfError::unexpected(operation, e.to_string()))
}

/// Prefer Graph's `error.code: error.message`, then the raw body, then the reason phrase.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(envelope) = serde_json::from_str::<GraphErrorEnvelope>(body) {
        return envelope.error.to_string();
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.chars().take(512).collect();
    }
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;

    fn client(base: &str) -> GraphClient {
        GraphClient::new(
            reqwest::Client::new(),
            base,
            Arc::new(StaticTokenProvider::new("t")),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_appends_segments() {
        let c = client("https://graph.microsoft.com/v1.0/");
        let url = c.endpoint(&["drives", "b!x", "items", "root", "children"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/drives/b!x/items/root/children"
        );
    }

    #[test]
    fn endpoint_encodes_spaces_and_slashes() {
        let c = client("https://graph.microsoft.com/v1.0");
        let url = c.endpoint(&["drives", "d", "items", "F:", "Q3 report/v2.docx:"]).unwrap();
        assert_eq!(
            url.path(),
            "/v1.0/drives/d/items/F:/Q3%20report%2Fv2.docx:"
        );
    }

    #[test]
    fn rejects_non_base_url() {
        let err = GraphClient::new(
            reqwest::Client::new(),
            "mailto:someone@example.com",
            Arc::new(StaticTokenProvider::new("t")),
        )
        .err()
        .unwrap();
        assert!(matches!(err, MsGraphPdfError::InvalidConfig(_)));
    }

    #[test]
    fn error_message_prefers_graph_envelope() {
        let body = r#"{"error":{"code":"accessDenied","message":"Access denied"}}"#;
        assert_eq!(
            error_message(body, reqwest::StatusCode::FORBIDDEN),
            "accessDenied: Access denied"
        );
    }

    #[test]
    fn error_message_falls_back_to_reason() {
        assert_eq!(
            error_message("", reqwest::StatusCode::BAD_GATEWAY),
            "Bad Gateway"
        );
        assert_eq!(
            error_message("upstream exploded", reqwest::StatusCode::BAD_GATEWAY),
            "upstream exploded"
        );
    }
}
