//! Label content stored in the backend: user profiles, artists and team
//! members, with their images in object storage.

mod artists;
mod error;
mod media;
mod profiles;
mod team;

pub use artists::{Artist, ArtistService, NewArtist};
pub use error::{CatalogError, CatalogResult};
pub use media::{content_type_for, file_extension};
pub use profiles::{Profile, ProfileForm, ProfileService, ProfileUpdate};
pub use team::{group_by_role, NewTeamMember, TeamMember, TeamService};

/// Result of a create call for records limited to one per user.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome<T> {
    Created(T),
    /// The user already owns a record; nothing was inserted.
    AlreadyExists { id: String },
}

impl<T> CreateOutcome<T> {
    /// Id of the record the user already owned, if nothing was created.
    pub fn existing_id(&self) -> Option<&str> {
        match self {
            CreateOutcome::Created(_) => None,
            CreateOutcome::AlreadyExists { id } => Some(id),
        }
    }

    pub fn created(self) -> Option<T> {
        match self {
            CreateOutcome::Created(value) => Some(value),
            CreateOutcome::AlreadyExists { .. } => None,
        }
    }
}
