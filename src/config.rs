//! Service configuration.
//!
//! All runtime behaviour is controlled through [`ServiceConfig`], built via
//! [`ServiceConfigBuilder`] or loaded from the environment with
//! [`ServiceConfig::from_env`]. The config is created once at start-up and
//! shared read-only by every request.
//!
//! # Environment
//!
//! | Variable               | Field                 | Default                              |
//! |------------------------|-----------------------|--------------------------------------|
//! | `AZURE_CLIENT_ID`      | `identity.client_id`  | required                             |
//! | `AZURE_CLIENT_SECRET`  | `identity.client_secret` | required                          |
//! | `AZURE_TENANT_ID`      | `identity.tenant_id`  | required                             |
//! | `DRIVE_ID`             | `drive_id`            | empty (needed by `/convert`)         |
//! | `UPLOAD_DIRECTORY`     | `upload_directory`    | empty (needed by `/convert`)         |
//! | `SERVICE_PORT`         | `port`                | `8181`, with a warning               |
//! | `GRAPH_BASE_URL`       | `graph_base_url`      | `https://graph.microsoft.com/v1.0`   |
//! | `AZURE_AUTHORITY_HOST` | `authority_host`      | `https://login.microsoftonline.com`  |
//! | `UPLOAD_CHUNK_SIZE`    | `chunk_size`          | 320 KiB                              |
//! | `STAGING_DIR`          | `staging_dir`         | OS temp dir                          |
//! | `MAX_UPLOAD_BYTES`     | `max_upload_bytes`    | 256 MiB                              |
//! | `REQUEST_TIMEOUT_SECS` | `request_timeout_secs`| none                                 |

use crate::error::MsGraphPdfError;
use crate::graph::upload::ChunkSize;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// Port used when `SERVICE_PORT` is not set.
pub const DEFAULT_PORT: u16 = 8181;

/// Graph v1.0 endpoint.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Public-cloud identity endpoint.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Largest upload accepted by default (256 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// The service principal used to call Graph.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
}

impl ServiceIdentity {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

impl fmt::Debug for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use msgraph_pdf::{ServiceConfig, ServiceIdentity};
///
/// let config = ServiceConfig::builder(ServiceIdentity::new("id", "secret", "tenant"))
///     .drive_id("b!abc")
///     .upload_directory("converted")
///     .port(9000)
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 9000);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Credentials for the client-credentials grant.
    pub identity: ServiceIdentity,

    /// Drive that receives uploads.
    pub drive_id: String,

    /// Folder name (under the drive root) that receives uploads.
    pub upload_directory: String,

    /// Listening port for `serve`. Default: 8181.
    pub port: u16,

    /// Graph endpoint, without trailing slash.
    pub graph_base_url: String,

    /// Identity endpoint, without trailing slash.
    pub authority_host: String,

    /// Bytes pushed per upload-session request. Default: 320 KiB.
    pub chunk_size: ChunkSize,

    /// Where transient upload and PDF files are written.
    pub staging_dir: PathBuf,

    /// Uploads larger than this are rejected while staging.
    pub max_upload_bytes: u64,

    /// Whole-request timeout applied by the HTTP client. None keeps reqwest's default.
    pub request_timeout_secs: Option<u64>,
}

impl ServiceConfig {
    /// Start a builder with defaults for everything but the identity.
    pub fn builder(identity: ServiceIdentity) -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: ServiceConfig {
                identity,
                drive_id: String::new(),
                upload_directory: String::new(),
                port: DEFAULT_PORT,
                graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
                authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
                chunk_size: ChunkSize::default(),
                staging_dir: std::env::temp_dir(),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                request_timeout_secs: None,
            },
        }
    }

    /// Load configuration from process environment variables.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, MsGraphPdfError> {
        Self::from_env_with_port(None)
    }

    /// Like [`ServiceConfig::from_env`], with `port` taking precedence over
    /// `SERVICE_PORT`.
    pub fn from_env_with_port(port: Option<u16>) -> Result<Self, MsGraphPdfError> {
        Self::from_lookup_with_port(|key| std::env::var(key).ok(), port)
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MsGraphPdfError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with_port(lookup, None)
    }

    /// Load through `lookup`; an explicit `port` skips `SERVICE_PORT` entirely.
    pub fn from_lookup_with_port<F>(lookup: F, port: Option<u16>) -> Result<Self, MsGraphPdfError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(MsGraphPdfError::MissingEnv(key));

        let identity = ServiceIdentity::new(
            require("AZURE_CLIENT_ID")?,
            require("AZURE_CLIENT_SECRET")?,
            require("AZURE_TENANT_ID")?,
        );

        let mut builder = Self::builder(identity)
            .drive_id(get("DRIVE_ID").unwrap_or_default())
            .upload_directory(get("UPLOAD_DIRECTORY").unwrap_or_default());

        if let Some(port) = port {
            builder = builder.port(port);
        } else if let Some(raw) = get("SERVICE_PORT") {
            let port = raw.trim().parse::<u16>().map_err(|_| {
                MsGraphPdfError::InvalidConfig(format!("SERVICE_PORT '{raw}' is not a valid port"))
            })?;
            builder = builder.port(port);
        } else {
            warn!("SERVICE_PORT not set, using default port {}", DEFAULT_PORT);
        }

        if let Some(url) = get("GRAPH_BASE_URL") {
            builder = builder.graph_base_url(url);
        }
        if let Some(host) = get("AZURE_AUTHORITY_HOST") {
            builder = builder.authority_host(host);
        }
        if let Some(raw) = get("UPLOAD_CHUNK_SIZE") {
            let bytes = parse_number("UPLOAD_CHUNK_SIZE", &raw)?;
            builder = builder.chunk_size(ChunkSize::new(bytes)?);
        }
        if let Some(dir) = get("STAGING_DIR") {
            builder = builder.staging_dir(dir);
        }
        if let Some(raw) = get("MAX_UPLOAD_BYTES") {
            builder = builder.max_upload_bytes(parse_number("MAX_UPLOAD_BYTES", &raw)?);
        }
        if let Some(raw) = get("REQUEST_TIMEOUT_SECS") {
            builder = builder.request_timeout_secs(parse_number("REQUEST_TIMEOUT_SECS", &raw)?);
        }

        builder.build()
    }

    /// Fail unless a target drive and folder are configured.
    ///
    /// Listing drives works without them; converting does not.
    pub fn require_upload_target(&self) -> Result<(), MsGraphPdfError> {
        if self.drive_id.trim().is_empty() {
            return Err(MsGraphPdfError::MissingEnv("DRIVE_ID"));
        }
        if self.upload_directory.trim().is_empty() {
            return Err(MsGraphPdfError::MissingEnv("UPLOAD_DIRECTORY"));
        }
        Ok(())
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, MsGraphPdfError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| MsGraphPdfError::InvalidConfig(format!("{key} '{raw}' is not a number")))
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn drive_id(mut self, id: impl Into<String>) -> Self {
        self.config.drive_id = id.into();
        self
    }

    pub fn upload_directory(mut self, name: impl Into<String>) -> Self {
        self.config.upload_directory = name.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn graph_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.graph_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn authority_host(mut self, host: impl Into<String>) -> Self {
        self.config.authority_host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn chunk_size(mut self, size: ChunkSize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, MsGraphPdfError> {
        let c = &self.config;
        let id = &c.identity;
        if id.client_id.is_empty() || id.client_secret.is_empty() || id.tenant_id.is_empty() {
            return Err(MsGraphPdfError::InvalidConfig(
                "client id, client secret and tenant id must all be set".into(),
            ));
        }
        for (name, url) in [
            ("graph base URL", &c.graph_base_url),
            ("authority host", &c.authority_host),
        ] {
            if reqwest::Url::parse(url).is_err() {
                return Err(MsGraphPdfError::InvalidConfig(format!(
                    "{name} '{url}' is not a valid URL"
                )));
            }
        }
        if c.max_upload_bytes == 0 {
            return Err(MsGraphPdfError::InvalidConfig(
                "max upload size must be at least 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const IDENTITY: [(&str, &str); 3] = [
        ("AZURE_CLIENT_ID", "client"),
        ("AZURE_CLIENT_SECRET", "s3cret"),
        ("AZURE_TENANT_ID", "tenant"),
    ];

    #[test]
    fn defaults_when_only_identity_is_set() {
        let config = ServiceConfig::from_lookup(lookup(&IDENTITY)).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.graph_base_url, DEFAULT_GRAPH_BASE_URL);
        assert_eq!(config.authority_host, DEFAULT_AUTHORITY_HOST);
        assert_eq!(config.chunk_size.get(), 320 * 1024);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.request_timeout_secs.is_none());
    }

    #[test]
    fn missing_secret_is_reported_by_name() {
        let err = ServiceConfig::from_lookup(lookup(&[
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_TENANT_ID", "tenant"),
        ]))
        .unwrap_err();
        assert!(matches!(err, MsGraphPdfError::MissingEnv("AZURE_CLIENT_SECRET")));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let mut pairs = IDENTITY.to_vec();
        pairs.push(("SERVICE_PORT", "  "));
        let config = ServiceConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn reads_all_overrides() {
        let mut pairs = IDENTITY.to_vec();
        pairs.extend([
            ("DRIVE_ID", "b!drive"),
            ("UPLOAD_DIRECTORY", "incoming"),
            ("SERVICE_PORT", "9090"),
            ("GRAPH_BASE_URL", "http://127.0.0.1:1234/v1.0/"),
            ("AZURE_AUTHORITY_HOST", "http://127.0.0.1:1235"),
            ("UPLOAD_CHUNK_SIZE", "655360"),
            ("STAGING_DIR", "/var/tmp/msgraph"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("REQUEST_TIMEOUT_SECS", "30"),
        ]);
        let config = ServiceConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.drive_id, "b!drive");
        assert_eq!(config.upload_directory, "incoming");
        assert_eq!(config.port, 9090);
        assert_eq!(config.graph_base_url, "http://127.0.0.1:1234/v1.0");
        assert_eq!(config.chunk_size.get(), 655_360);
        assert_eq!(config.staging_dir, PathBuf::from("/var/tmp/msgraph"));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.request_timeout_secs, Some(30));
        assert!(config.require_upload_target().is_ok());
    }

    #[test]
    fn misaligned_chunk_size_is_rejected() {
        let mut pairs = IDENTITY.to_vec();
        pairs.push(("UPLOAD_CHUNK_SIZE", "1000000"));
        let err = ServiceConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, MsGraphPdfError::InvalidChunkSize { .. }));
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut pairs = IDENTITY.to_vec();
        pairs.push(("SERVICE_PORT", "eighty"));
        let err = ServiceConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, MsGraphPdfError::InvalidConfig(_)));
    }

    #[test]
    fn upload_target_required_for_conversion() {
        let config = ServiceConfig::from_lookup(lookup(&IDENTITY)).unwrap();
        assert!(matches!(
            config.require_upload_target(),
            Err(MsGraphPdfError::MissingEnv("DRIVE_ID"))
        ));
    }

    /// Run `f` with a subscriber that writes into the returned buffer.
    fn captured_logs(f: impl FnOnce()) -> String {
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Buf(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Buf {
            fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(data);
                Ok(data.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buf = Buf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn explicit_port_wins_without_default_warning() {
        let logs = captured_logs(|| {
            let config =
                ServiceConfig::from_lookup_with_port(lookup(&IDENTITY), Some(9000)).unwrap();
            assert_eq!(config.port, 9000);
        });
        assert!(!logs.contains("SERVICE_PORT not set"), "got: {logs}");
    }

    #[test]
    fn explicit_port_overrides_env_value() {
        let mut pairs = IDENTITY.to_vec();
        pairs.push(("SERVICE_PORT", "not-a-port"));
        let config = ServiceConfig::from_lookup_with_port(lookup(&pairs), Some(9000)).unwrap();
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn unset_port_warns_about_default() {
        let logs = captured_logs(|| {
            let config = ServiceConfig::from_lookup(lookup(&IDENTITY)).unwrap();
            assert_eq!(config.port, DEFAULT_PORT);
        });
        assert!(logs.contains("SERVICE_PORT not set, using default port 8181"), "got: {logs}");
    }

    #[test]
    fn debug_redacts_secret() {
        let id = ServiceIdentity::new("client", "s3cret", "tenant");
        let printed = format!("{id:?}");
        assert!(!printed.contains("s3cret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn builder_rejects_invalid_url() {
        let err = ServiceConfig::builder(ServiceIdentity::new("a", "b", "c"))
            .graph_base_url("not a url")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("graph base URL"));
    }
}
