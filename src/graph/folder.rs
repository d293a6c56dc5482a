//! Destination folder lookup.

use super::models::{ConflictBehavior, DriveItem, EmptyObject, NewFolder};
use super::GraphClient;
use crate::error::MsGraphPdfError;
use tracing::{debug, info, warn};

/// A folder in a drive, as resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderHandle {
    pub id: String,
    pub name: String,
}

impl GraphClient {
    /// Find `name` among the root children of `drive_id`, creating it if absent.
    ///
    /// The match is exact and case-sensitive, and only folders count: a plain
    /// file with the same name is passed over. Creation asks Graph to rename on
    /// conflict, so two requests racing to create the same folder both
    /// succeed; the loser gets a folder with a suffixed name (`name 1`).
    pub async fn resolve_or_create_folder(
        &self,
        drive_id: &str,
        name: &str,
    ) -> Result<FolderHandle, MsGraphPdfError> {
        let children_url = self.endpoint(&["drives", drive_id, "items", "root", "children"])?;
        let children: Vec<DriveItem> = self
            .get_all_pages("list items", children_url.clone())
            .await?;

        if let Some(existing) = children
            .into_iter()
            .find(|item| item.is_folder() && item.name.as_deref() == Some(name))
        {
            debug!("Found existing folder '{}' ({})", name, existing.id);
            return Ok(FolderHandle {
                id: existing.id,
                name: name.to_string(),
            });
        }

        info!("Folder '{}' not found in drive {}, creating it", name, drive_id);
        let body = NewFolder {
            name,
            folder: EmptyObject::default(),
            conflict_behavior: ConflictBehavior::Rename,
        };
        let response = self
            .send("create folder", self.http().post(children_url).json(&body))
            .await?;
        let created: DriveItem = super::read_json("create folder", response).await?;

        let created_name = created.name.unwrap_or_else(|| name.to_string());
        if created_name != name {
            warn!(
                "Folder '{}' was created as '{}' because of a name conflict",
                name, created_name
            );
        }

        Ok(FolderHandle {
            id: created.id,
            name: created_name,
        })
    }
}
