use serde::{Deserialize, Serialize};
use sqlx::sqlx_macros::Type;

use crate::models::modpacks::{Modpack, ModpackDraft, ModReference};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Hash, Eq, PartialOrd, Ord, Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ModpackId(pub i64);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Hash, Eq, PartialOrd, Ord, Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for ModpackId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize)]
pub struct ModpackResponse {
    pub modpack: Modpack,
    pub mods: Vec<ModReference>,
}

#[derive(Serialize, Deserialize)]
pub struct ModpackListResponse {
    pub modpacks: Vec<Modpack>,
}

// Modpack create / update share one body; update replaces everything.
pub type ModpackCreateBody = ModpackDraft;
pub type ModpackUpdateBody = ModpackDraft;

#[derive(Serialize, Deserialize)]
pub struct ModpackCreateResponse {
    pub modpack_id: ModpackId,
}

#[derive(Serialize, Deserialize)]
pub struct ModpackImportResponse {
    pub modpack_id: ModpackId,
}

// Users
#[derive(Serialize, Deserialize)]
pub struct UserCreateBody {
    pub username: String,
}

#[derive(Serialize, Deserialize)]
pub struct UserCreateResponse {
    pub user_id: UserId,
    pub username: String,
    pub api_token: String,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
