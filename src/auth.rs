//! Access-token acquisition for the Graph API.
//!
//! [`TokenProvider`] is the seam between the storage client and whatever
//! issues bearer tokens. [`ClientSecretCredential`] implements the OAuth2
//! client-credentials grant against the Microsoft identity platform and caches
//! the token until shortly before it expires; [`StaticTokenProvider`] hands out
//! a fixed token and is what tests use.

use crate::config::ServiceIdentity;
use crate::error::MsGraphPdfError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Scope requested for every token.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Refresh this long before the reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the identity provider omits `expires_in`.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// Anything that can hand out a bearer token for Graph.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a currently valid access token.
    async fn get_token(&self) -> Result<String, MsGraphPdfError>;
}

/// A provider that always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Result<String, MsGraphPdfError> {
        Ok(self.token.clone())
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client-credentials grant with an in-memory token cache.
///
/// Concurrent callers share one refresh: the first caller to find the cache
/// stale takes the write lock, the rest re-check after it is released.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    identity: ServiceIdentity,
    token_url: String,
    cache: RwLock<Option<CachedToken>>,
}

impl ClientSecretCredential {
    /// Create a credential for `identity` against `authority_host`
    /// (e.g. `https://login.microsoftonline.com`).
    pub fn new(http: reqwest::Client, identity: ServiceIdentity, authority_host: &str) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            authority_host.trim_end_matches('/'),
            identity.tenant_id
        );
        Self {
            http,
            identity,
            token_url,
            cache: RwLock::new(None),
        }
    }

    /// The endpoint tokens are requested from.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn request_token(&self) -> Result<CachedToken, MsGraphPdfError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.identity.client_id.as_str()),
            ("client_secret", self.identity.client_secret.as_str()),
            ("scope", GRAPH_DEFAULT_SCOPE),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| self.auth_error(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.auth_error(e.to_string()))?;

        if !status.is_success() {
            let detail = match serde_json::from_slice::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => format!("HTTP {}", status.as_u16()),
            };
            return Err(self.auth_error(detail));
        }

        let token: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| self.auth_error(format!("malformed token response: {e}")))?;

        let ttl = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(TOKEN_DEFAULT_TTL);

        debug!("Acquired Graph access token, valid for {}s", ttl.as_secs());

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + ttl,
        })
    }

    fn auth_error(&self, detail: String) -> MsGraphPdfError {
        MsGraphPdfError::Auth {
            tenant: self.identity.tenant_id.clone(),
            detail,
        }
    }
}

#[async_trait]
impl TokenProvider for ClientSecretCredential {
    async fn get_token(&self) -> Result<String, MsGraphPdfError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        match self.request_token().await {
            Ok(fresh) => {
                let token = fresh.access_token.clone();
                *cache = Some(fresh);
                Ok(token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref() {
                    if cached.is_usable() {
                        warn!("Token refresh failed, using existing token: {}", e);
                        return Ok(cached.access_token.clone());
                    }
                }
                Err(e)
            }
        }
    }
}
