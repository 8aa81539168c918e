//! Artist profiles. Each user may own at most one.

use crate::error::{CatalogError, CatalogResult};
use crate::CreateOutcome;
use backend_client::{
    decode_rows, select_maybe_single, select_rows, Cardinality, Filter, Identity,
    TableApi,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

const ARTISTS: &str = "artists";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewArtist {
    pub name: String,
    pub genre: String,
    pub style: String,
    pub bio: String,
}

#[derive(Deserialize)]
pub(crate) struct RowId {
    pub id: String,
}

pub struct ArtistService {
    tables: Arc<dyn TableApi>,
}

impl ArtistService {
    pub fn new(tables: Arc<dyn TableApi>) -> Self {
        Self { tables }
    }

    pub async fn list(&self) -> CatalogResult<Vec<Artist>> {
        let artists: Vec<Artist> = select_rows(self.tables.as_ref(), ARTISTS, &[]).await?;
        debug!(count = artists.len(), "Artists listed");
        Ok(artists)
    }

    pub async fn get(&self, id: &str) -> CatalogResult<Option<Artist>> {
        Ok(select_maybe_single(self.tables.as_ref(), ARTISTS, &[Filter::eq("id", id)]).await?)
    }

    /// Create the user's artist profile, unless they already have one.
    pub async fn create(
        &self,
        identity: Option<&Identity>,
        artist: NewArtist,
    ) -> CatalogResult<CreateOutcome<Artist>> {
        let user = identity.ok_or(CatalogError::NotSignedIn("create an artist profile"))?;
        if artist.name.trim().is_empty() {
            return Err(CatalogError::Validation("Artist name is required".to_string()));
        }

        let existing = self
            .tables
            .select(ARTISTS, "id", &[Filter::eq("user_id", user.id.as_str())])
            .await?;
        Cardinality::AtMostOne.check(existing.len())?;
        if let Some(row) = decode_rows::<RowId>(existing)?.pop() {
            info!(user_id = %user.id, artist_id = %row.id, "Artist profile already exists");
            return Ok(CreateOutcome::AlreadyExists { id: row.id });
        }

        let inserted = self
            .tables
            .insert(
                ARTISTS,
                json!([{
                    "name": artist.name.trim(),
                    "genre": artist.genre,
                    "style": artist.style,
                    "bio": artist.bio,
                    "user_id": user.id,
                }]),
            )
            .await?;
        let created = decode_rows::<Artist>(inserted)?
            .into_iter()
            .next()
            .ok_or(CatalogError::EmptyInsert("artist profile"))?;

        info!(user_id = %user.id, artist_id = %created.id, "Artist profile created");
        Ok(CreateOutcome::Created(created))
    }
}
