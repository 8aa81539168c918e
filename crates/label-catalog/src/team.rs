//! Team member profiles and their pictures.

use crate::artists::RowId;
use crate::error::{CatalogError, CatalogResult};
use crate::media::{content_type_for, require_image};
use crate::CreateOutcome;
use backend_client::{
    decode_rows, select_rows, select_single, Cardinality, Filter, Identity, StorageApi, TableApi,
    UploadOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

const TEAM_MEMBERS: &str = "team_members";
const TEAM_BUCKET: &str = "team-members";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTeamMember {
    pub name: String,
    pub role: String,
    pub bio: String,
}

pub struct TeamService {
    tables: Arc<dyn TableApi>,
    storage: Arc<dyn StorageApi>,
}

impl TeamService {
    pub fn new(tables: Arc<dyn TableApi>, storage: Arc<dyn StorageApi>) -> Self {
        Self { tables, storage }
    }

    pub async fn list(&self) -> CatalogResult<Vec<TeamMember>> {
        let members: Vec<TeamMember> = select_rows(self.tables.as_ref(), TEAM_MEMBERS, &[]).await?;
        debug!(count = members.len(), "Team members listed");
        Ok(members)
    }

    pub async fn get(&self, id: &str) -> CatalogResult<TeamMember> {
        Ok(select_single(self.tables.as_ref(), TEAM_MEMBERS, &[Filter::eq("id", id)]).await?)
    }

    pub async fn create(
        &self,
        identity: Option<&Identity>,
        member: NewTeamMember,
    ) -> CatalogResult<CreateOutcome<TeamMember>> {
        let user = identity.ok_or(CatalogError::NotSignedIn("create a team member profile"))?;
        if member.name.trim().is_empty() || member.role.trim().is_empty() {
            return Err(CatalogError::Validation(
                "Name and role are required".to_string(),
            ));
        }

        let existing = self
            .tables
            .select(TEAM_MEMBERS, "id", &[Filter::eq("user_id", user.id.as_str())])
            .await?;
        Cardinality::AtMostOne.check(existing.len())?;
        if let Some(row) = decode_rows::<RowId>(existing)?.pop() {
            info!(user_id = %user.id, member_id = %row.id, "Team member profile already exists");
            return Ok(CreateOutcome::AlreadyExists { id: row.id });
        }

        let inserted = self
            .tables
            .insert(
                TEAM_MEMBERS,
                json!([{
                    "name": member.name.trim(),
                    "role": member.role.trim(),
                    "bio": member.bio,
                    "user_id": user.id,
                }]),
            )
            .await?;
        let created = decode_rows::<TeamMember>(inserted)?
            .into_iter()
            .next()
            .ok_or(CatalogError::EmptyInsert("team member"))?;

        info!(user_id = %user.id, member_id = %created.id, "Team member profile created");
        Ok(CreateOutcome::Created(created))
    }

    /// Replace the member's picture and return the member with its new URL.
    ///
    /// Only the user linked to the member may do this. The object lives at
    /// `{member id}.{ext}` and is overwritten on every upload.
    pub async fn upload_avatar(
        &self,
        requester: Option<&Identity>,
        member: &TeamMember,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> CatalogResult<TeamMember> {
        let user = requester.ok_or(CatalogError::NotSignedIn("update a team member picture"))?;
        if member.user_id.as_deref() != Some(user.id.as_str()) {
            return Err(CatalogError::NotOwner("team member"));
        }
        let extension = require_image(file_name, &bytes)?;
        let path = format!("{}.{}", member.id, extension);

        self.storage
            .upload(
                TEAM_BUCKET,
                &path,
                bytes,
                UploadOptions::default()
                    .upsert(true)
                    .content_type(content_type_for(&extension)),
            )
            .await?;
        let url = self.storage.public_url(TEAM_BUCKET, &path);

        self.tables
            .update(
                TEAM_MEMBERS,
                json!({ "avatar_url": url }),
                &[Filter::eq("id", member.id.as_str())],
            )
            .await?;

        info!(member_id = %member.id, path = %path, "Team member picture updated");
        Ok(TeamMember {
            avatar_url: Some(url),
            ..member.clone()
        })
    }
}

/// Group members by role, roles in order of first appearance and members
/// in their original order.
pub fn group_by_role(members: &[TeamMember]) -> Vec<(String, Vec<TeamMember>)> {
    let mut groups: Vec<(String, Vec<TeamMember>)> = Vec::new();
    for member in members {
        match groups.iter_mut().find(|(role, _)| *role == member.role) {
            Some((_, group)) => group.push(member.clone()),
            None => groups.push((member.role.clone(), vec![member.clone()])),
        }
    }
    groups
}
