//! Translation between a modpack aggregate and the `minecraftModpack`
//! manifest format.
//!
//! Encoding is deterministic: the same aggregate and author always produce the
//! same bytes. Decoding runs an ordered rule pipeline over the loosely-typed
//! JSON and substitutes defaults for optional fields.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    models::modpacks::{ModReference, ModpackAggregate, ModpackDraft, MAX_NAME_LEN},
    MANIFEST_TYPE,
};

pub const MANIFEST_VERSION: u32 = 1;
pub const PACK_VERSION: &str = "1.0.0";
pub const DEFAULT_MOD_LOADER: &str = "forge-latest";
pub const DEFAULT_PACK_NAME: &str = "Imported Modpack";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub minecraft: MinecraftSection,
    #[serde(rename = "manifestType")]
    pub manifest_type: String,
    #[serde(rename = "manifestVersion")]
    pub manifest_version: u32,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub files: Vec<ManifestFile>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MinecraftSection {
    pub version: String,
    #[serde(rename = "modLoaders")]
    pub mod_loaders: Vec<ModLoader>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModLoader {
    pub id: String,
    pub primary: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestFile {
    #[serde(rename = "projectID")]
    pub project_id: i64,
    #[serde(rename = "fileID")]
    pub file_id: i64,
    pub required: bool,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ManifestError {
    #[error("malformed manifest: {0}")]
    Format(String),
    #[error("{0}")]
    Validation(String),
}

/// A file entry that was dropped during decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestWarning {
    pub index: usize,
    pub reason: String,
}

impl std::fmt::Display for ManifestWarning {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "files[{}]: {}", self.index, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedManifest {
    pub draft: ModpackDraft,
    pub warnings: Vec<ManifestWarning>,
}

impl Manifest {
    pub fn from_aggregate(aggregate: &ModpackAggregate, author: &str) -> Self {
        let mut files: Vec<ManifestFile> = aggregate
            .mods
            .iter()
            .map(|x| ManifestFile {
                project_id: x.project_id,
                file_id: x.file_id,
                required: x.required,
            })
            .collect();
        files.sort_by_key(|x| (x.project_id, x.file_id));

        Manifest {
            minecraft: MinecraftSection {
                version: aggregate.modpack.game_version.clone(),
                mod_loaders: vec![ModLoader {
                    id: DEFAULT_MOD_LOADER.to_string(),
                    primary: true,
                }],
            },
            manifest_type: MANIFEST_TYPE.to_string(),
            manifest_version: MANIFEST_VERSION,
            name: aggregate.modpack.name.clone(),
            version: PACK_VERSION.to_string(),
            author: author.to_string(),
            description: aggregate.modpack.description.clone().unwrap_or_default(),
            files,
        }
    }
}

/// Serializes an aggregate into manifest bytes, with `author` as the
/// owner's display name.
pub fn encode(aggregate: &ModpackAggregate, author: &str) -> Result<Vec<u8>, ManifestError> {
    serde_json::to_vec(&Manifest::from_aggregate(aggregate, author))
        .map_err(|e| ManifestError::Format(e.to_string()))
}

/// Partially decoded state threaded through the rule pipeline.
#[derive(Default)]
struct Pending {
    game_version: String,
    entries: Vec<Value>,
    mods: Vec<ModReference>,
    warnings: Vec<ManifestWarning>,
}

type Rule = fn(&Map<String, Value>, &mut Pending) -> Result<(), ManifestError>;

/// Applied in order; the first failing rule aborts decoding.
const RULES: &[Rule] = &[require_game_version, require_files, collect_files];

pub fn decode(bytes: &[u8]) -> Result<DecodedManifest, ManifestError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ManifestError::Format(e.to_string()))?;
    let Value::Object(root) = value else {
        return Err(ManifestError::Format(
            "top-level value is not an object".to_string(),
        ));
    };

    let mut pending = Pending::default();
    for rule in RULES {
        rule(&root, &mut pending)?;
    }

    let name = root
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .unwrap_or(DEFAULT_PACK_NAME)
        .chars()
        .take(MAX_NAME_LEN)
        .collect::<String>()
        .trim_end()
        .to_string();
    let description = root
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Ok(DecodedManifest {
        draft: ModpackDraft {
            name,
            description: Some(description),
            game_version: pending.game_version,
            mods: pending.mods,
        },
        warnings: pending.warnings,
    })
}

fn require_game_version(
    root: &Map<String, Value>,
    pending: &mut Pending,
) -> Result<(), ManifestError> {
    let version = root
        .get("minecraft")
        .and_then(|x| x.get("version"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    if version.is_empty() {
        return Err(ManifestError::Validation("missing gameVersion".to_string()));
    }
    pending.game_version = version.to_string();
    Ok(())
}

fn require_files(root: &Map<String, Value>, pending: &mut Pending) -> Result<(), ManifestError> {
    match root.get("files") {
        Some(Value::Array(entries)) if !entries.is_empty() => {
            pending.entries = entries.clone();
            Ok(())
        }
        _ => Err(ManifestError::Validation("missing files".to_string())),
    }
}

fn collect_files(_: &Map<String, Value>, pending: &mut Pending) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();
    for (index, entry) in pending.entries.iter().enumerate() {
        match parse_file(entry) {
            Ok(reference) if !seen.insert(reference.project_id) => {
                pending.warnings.push(ManifestWarning {
                    index,
                    reason: format!("projectID {} already listed", reference.project_id),
                });
            }
            Ok(reference) => pending.mods.push(reference),
            Err(reason) => pending.warnings.push(ManifestWarning { index, reason }),
        }
    }
    if pending.mods.is_empty() {
        return Err(ManifestError::Validation("no valid files".to_string()));
    }
    Ok(())
}

fn parse_file(entry: &Value) -> Result<ModReference, String> {
    let Value::Object(entry) = entry else {
        return Err("entry is not an object".to_string());
    };
    let project_id = positive_id(entry, "projectID")?;
    let file_id = positive_id(entry, "fileID")?;
    let required = match entry.get("required") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(x)) => *x,
        Some(_) => return Err("required is not a boolean".to_string()),
    };
    Ok(ModReference {
        project_id,
        file_id,
        required,
    })
}

fn positive_id(entry: &Map<String, Value>, key: &str) -> Result<i64, String> {
    match entry.get(key) {
        None => Err(format!("missing {key}")),
        Some(value) => value
            .as_i64()
            .filter(|x| *x > 0)
            .ok_or_else(|| format!("{key} is not a positive integer")),
    }
}
