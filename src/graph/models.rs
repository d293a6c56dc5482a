//! Wire types for the subset of Graph payloads this crate reads and writes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A paged collection (`{"value": [...], "@odata.nextLink": "..."}`).
#[derive(Debug, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// A drive (document library, OneDrive). Only the id is read.
#[derive(Debug, Clone, Deserialize)]
pub struct Drive {
    pub id: String,
}

/// A file or folder inside a drive.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub folder: Option<serde_json::Value>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

/// What the service asks Graph to do when a name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictBehavior {
    Rename,
    Replace,
}

/// Body of `POST .../children` creating a folder.
#[derive(Debug, Serialize)]
pub struct NewFolder<'a> {
    pub name: &'a str,
    pub folder: EmptyObject,
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    pub conflict_behavior: ConflictBehavior,
}

/// Serialises as `{}`.
#[derive(Debug, Default, Serialize)]
pub struct EmptyObject {}

/// Body of `POST .../createUploadSession`.
#[derive(Debug, Serialize)]
pub struct CreateUploadSession {
    pub item: UploadableProperties,
}

#[derive(Debug, Serialize)]
pub struct UploadableProperties {
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    pub conflict_behavior: ConflictBehavior,
}

/// Returned by `createUploadSession` and by intermediate chunk `PUT`s.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionResponse {
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub expiration_date_time: Option<String>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

/// `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
pub struct GraphErrorEnvelope {
    pub error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for GraphErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code.is_empty(), self.message.is_empty()) {
            (false, false) => write!(f, "{}: {}", self.code, self.message),
            (false, true) => f.write_str(&self.code),
            _ => f.write_str(&self.message),
        }
    }
}
