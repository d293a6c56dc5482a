//! Route handlers.

use super::error::ApiResult;
use super::AppState;
use crate::error::MsGraphPdfError;
use crate::pipeline::ConvertedFile;
use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::debug;

/// Multipart field carrying the document.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct DrivesResponse {
    pub drives: Vec<String>,
}

/// `GET /drives`
pub async fn list_drives(State(state): State<AppState>) -> ApiResult<Json<DrivesResponse>> {
    let drives = state.client.list_drives().await?;
    Ok(Json(DrivesResponse { drives }))
}

/// `POST /convert`
///
/// A request that is not multipart at all is treated like one without a
/// `file` field. Without a configured upload target every request fails
/// with the missing variable before the body is read.
pub async fn convert(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let pipeline = state.pipeline()?;
    let mut multipart = multipart.map_err(|rejection| {
        debug!("Not a multipart request: {}", rejection.body_text());
        MsGraphPdfError::NoFileUploaded
    })?;

    let staged = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| MsGraphPdfError::MalformedRequest(e.body_text()))?;
        let Some(field) = field else {
            return Err(MsGraphPdfError::NoFileUploaded.into());
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        break pipeline.stage(&file_name, field).await?;
    };

    let converted = pipeline.run(&staged).await?;
    drop(staged);

    Ok(rendition_response(converted))
}

/// Stream the staged rendition as the response body.
fn rendition_response(converted: ConvertedFile) -> Response {
    let headers = [
        (header::CONTENT_TYPE, converted.format().mime_type().to_string()),
        (header::CONTENT_LENGTH, converted.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(converted.file_name()),
        ),
    ];
    let body = Body::from_stream(converted.into_stream());
    (headers, body).into_response()
}

/// `inline; filename="..."` with anything outside printable ASCII replaced.
fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("inline; filename=\"{safe}\"")
}
