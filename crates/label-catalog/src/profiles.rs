//! Profile settings: the signed-in user's `profiles` row and avatar.

use crate::error::{CatalogError, CatalogResult};
use crate::media::{content_type_for, require_image};
use backend_client::{
    decode_rows, select_single, BackendError, Cardinality, Filter, Identity, StorageApi,
    TableApi, UploadOptions,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const PROFILES: &str = "profiles";
const AVATARS_BUCKET: &str = "avatars";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Editable profile columns, written as one update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub username: String,
    pub website: String,
    pub bio: String,
    pub avatar_url: String,
    pub location: String,
}

/// Local form state for the profile page. Changes stay local until saved
/// with [`ProfileService::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileForm {
    values: ProfileUpdate,
}

impl ProfileForm {
    pub fn from_profile(profile: &Profile) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            values: ProfileUpdate {
                full_name: text(&profile.full_name),
                username: text(&profile.username),
                website: text(&profile.website),
                bio: text(&profile.bio),
                avatar_url: text(&profile.avatar_url),
                location: text(&profile.location),
            },
        }
    }

    pub fn values(&self) -> &ProfileUpdate {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut ProfileUpdate {
        &mut self.values
    }

    /// Show a freshly uploaded avatar before the profile is saved.
    pub fn apply_avatar(&mut self, url: impl Into<String>) {
        self.values.avatar_url = url.into();
    }
}

pub struct ProfileService {
    tables: Arc<dyn TableApi>,
    storage: Arc<dyn StorageApi>,
}

impl ProfileService {
    pub fn new(tables: Arc<dyn TableApi>, storage: Arc<dyn StorageApi>) -> Self {
        Self { tables, storage }
    }

    fn require<'a>(identity: Option<&'a Identity>) -> CatalogResult<&'a Identity> {
        identity.ok_or(CatalogError::NotSignedIn("manage your profile"))
    }

    pub async fn fetch(&self, identity: Option<&Identity>) -> CatalogResult<Profile> {
        let user = Self::require(identity)?;
        let profile = select_single(
            self.tables.as_ref(),
            PROFILES,
            &[Filter::eq("id", user.id.as_str())],
        )
        .await?;
        debug!(user_id = %user.id, "Profile loaded");
        Ok(profile)
    }

    pub async fn update(
        &self,
        identity: Option<&Identity>,
        update: &ProfileUpdate,
    ) -> CatalogResult<Profile> {
        let user = Self::require(identity)?;
        let patch = serde_json::to_value(update).map_err(BackendError::from)?;
        let rows = self
            .tables
            .update(PROFILES, patch, &[Filter::eq("id", user.id.as_str())])
            .await?;
        Cardinality::ExactlyOne.check(rows.len())?;

        let mut profiles = decode_rows::<Profile>(rows)?;
        info!(user_id = %user.id, "Profile updated");
        profiles.pop().ok_or_else(|| {
            BackendError::RowCount {
                expected: Cardinality::ExactlyOne,
                actual: 0,
            }
            .into()
        })
    }

    /// Store a new avatar image and return its public URL. The profile row
    /// is not touched.
    pub async fn upload_avatar(
        &self,
        identity: Option<&Identity>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> CatalogResult<String> {
        let user = Self::require(identity)?;
        let extension = require_image(file_name, &bytes)?;
        let path = format!("{}/{:016x}.{}", user.id, rand::random::<u64>(), extension);

        self.storage
            .upload(
                AVATARS_BUCKET,
                &path,
                bytes,
                UploadOptions::default().content_type(content_type_for(&extension)),
            )
            .await?;

        let url = self.storage.public_url(AVATARS_BUCKET, &path);
        info!(user_id = %user.id, path = %path, "Avatar uploaded");
        Ok(url)
    }
}
