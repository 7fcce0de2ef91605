use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::api::{ModpackId, UserId};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_GAME_VERSION_LEN: usize = 64;

/// Modpack header. Also used as the list summary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Modpack {
    pub id: ModpackId,
    pub owner: UserId,
    pub name: String,
    pub description: Option<String>,
    pub game_version: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A selected file of one external mod project.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModReference {
    pub project_id: i64,
    pub file_id: i64,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Header plus the complete set of references currently attached to it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModpackAggregate {
    pub modpack: Modpack,
    pub mods: Vec<ModReference>,
}

/// Everything a caller supplies when creating or replacing a modpack.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModpackDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub game_version: String,
    #[serde(default)]
    pub mods: Vec<ModReference>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DraftError {
    #[error("{0}")]
    Invalid(String),
    #[error("project {0} is referenced more than once")]
    DuplicateProject(i64),
}

impl ModpackDraft {
    /// Normalizes the draft and checks every field. Nothing is deduplicated:
    /// a repeated project is an error.
    pub fn validated(self) -> Result<Self, DraftError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DraftError::Invalid("name must not be empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DraftError::Invalid(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }

        let game_version = self.game_version.trim().to_string();
        if game_version.is_empty() {
            return Err(DraftError::Invalid(
                "game_version must not be empty".to_string(),
            ));
        }
        if game_version.chars().count() > MAX_GAME_VERSION_LEN {
            return Err(DraftError::Invalid(format!(
                "game_version must be at most {MAX_GAME_VERSION_LEN} characters"
            )));
        }

        let mut seen = HashSet::with_capacity(self.mods.len());
        for reference in self.mods.iter() {
            if reference.project_id <= 0 || reference.file_id <= 0 {
                return Err(DraftError::Invalid(format!(
                    "invalid mod reference {}:{}",
                    reference.project_id, reference.file_id
                )));
            }
            if !seen.insert(reference.project_id) {
                return Err(DraftError::DuplicateProject(reference.project_id));
            }
        }

        Ok(ModpackDraft {
            name,
            description: self.description.filter(|x| !x.trim().is_empty()),
            game_version,
            mods: self.mods,
        })
    }
}
