//! JSON error responses.

use crate::error::{ErrorCategory, MsGraphPdfError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

pub type ApiResult<T> = Result<T, ApiError>;

/// A library error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub MsGraphPdfError);

impl From<MsGraphPdfError> for ApiError {
    fn from(e: MsGraphPdfError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Io
            | ErrorCategory::Auth
            | ErrorCategory::Remote
            | ErrorCategory::Config => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{"error": "<message>"}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.0.to_string();
        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            warn!("Rejected request: {}", message);
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let e = ApiError::from(MsGraphPdfError::NoFileUploaded);
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn remote_and_auth_map_to_500() {
        let remote = ApiError::from(MsGraphPdfError::UploadFailed("x".into()));
        assert_eq!(remote.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let auth = ApiError::from(MsGraphPdfError::Auth {
            tenant: "t".into(),
            detail: "d".into(),
        });
        assert_eq!(auth.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn body_shape() {
        let body = serde_json::to_value(ErrorBody {
            error: "No file uploaded".into(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"error": "No file uploaded"}));
    }
}
