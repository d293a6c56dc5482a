//! HTTP front-end.
//!
//! ```text
//! POST /convert   multipart field `file` → PDF bytes
//! GET  /drives    → {"drives": [...]}
//! ```
//!
//! Errors come back as `{"error": "<message>"}` with 400 for caller mistakes
//! and 500 for everything else.

pub mod error;
pub mod handlers;

use crate::config::ServiceConfig;
use crate::error::MsGraphPdfError;
use crate::graph::GraphClient;
use crate::pipeline::ConversionPipeline;
use crate::progress::LoggingProgressCallback;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared, read-only state handed to every handler.
///
/// The Graph client is always present. The conversion pipeline exists only
/// when an upload target is configured; without one `/drives` still works and
/// `/convert` reports the missing variable.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<GraphClient>,
    pipeline: Result<Arc<ConversionPipeline>, &'static str>,
    max_upload_bytes: u64,
}

impl AppState {
    /// State around a ready pipeline.
    pub fn new(pipeline: ConversionPipeline) -> Self {
        Self {
            client: pipeline.client().clone(),
            max_upload_bytes: pipeline.max_upload_bytes(),
            pipeline: Ok(Arc::new(pipeline)),
        }
    }

    /// State for `client` and whatever upload target `config` carries.
    ///
    /// Chunk progress is logged at `info`.
    pub fn from_parts(
        client: Arc<GraphClient>,
        config: &ServiceConfig,
    ) -> Result<Self, MsGraphPdfError> {
        match ConversionPipeline::new(client.clone(), config) {
            Ok(pipeline) => Ok(Self::new(
                pipeline.with_progress(Arc::new(LoggingProgressCallback)),
            )),
            Err(MsGraphPdfError::MissingEnv(var)) => {
                warn!("{} not set, POST /convert is disabled", var);
                Ok(Self {
                    client,
                    pipeline: Err(var),
                    max_upload_bytes: config.max_upload_bytes,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Build the Graph client described by `config`, then the state around it.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, MsGraphPdfError> {
        let client = Arc::new(GraphClient::from_config(config)?);
        Self::from_parts(client, config)
    }

    /// The conversion pipeline, or the variable that keeps it from existing.
    pub fn pipeline(&self) -> Result<&ConversionPipeline, MsGraphPdfError> {
        self.pipeline
            .as_deref()
            .map_err(|var| MsGraphPdfError::MissingEnv(*var))
    }
}

/// Create the service router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD)
        .min(usize::MAX as u64) as usize;

    Router::new()
        .route("/convert", post(handlers::convert))
        .route("/drives", get(handlers::list_drives))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `0.0.0.0:{config.port}` and serve until Ctrl-C.
pub async fn serve(config: &ServiceConfig) -> Result<(), MsGraphPdfError> {
    let state = AppState::from_config(config)?;
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| MsGraphPdfError::Serve { addr, source })?;

    info!("Starting server on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| MsGraphPdfError::Serve { addr, source })?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
