use std::sync::Arc;

use packsmith_core::{
    api::{ModpackId, UserId},
    archive::{self, ArchiveLimits},
    manifest,
};
use tracing::{info, warn};

use super::{error::ApiError, store::ModpackStore};

/// Export and import of modpacks as manifest archives. Holds no state of
/// its own; every call wraps exactly one store operation.
pub struct ImportExportService<S: ?Sized> {
    store: Arc<S>,
    limits: ArchiveLimits,
}

pub struct ExportedArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl<S: ModpackStore + ?Sized> ImportExportService<S> {
    pub fn new(store: Arc<S>, limits: ArchiveLimits) -> Self {
        Self { store, limits }
    }

    pub async fn export(
        &self,
        modpack_id: ModpackId,
        owner: UserId,
    ) -> Result<ExportedArchive, ApiError> {
        let aggregate = self.store.get(modpack_id, owner).await?;
        let author = self.store.display_name(owner).await?;
        let manifest = manifest::encode(&aggregate, &author)?;
        let bytes = archive::pack(&manifest)?;
        Ok(ExportedArchive {
            file_name: archive_file_name(&aggregate.modpack.name),
            bytes,
        })
    }

    /// Always creates a new modpack. File entries the codec rejected are
    /// dropped; at least one must survive.
    pub async fn import(&self, owner: UserId, upload: &[u8]) -> Result<ModpackId, ApiError> {
        let manifest = archive::unpack(upload, &self.limits)?;
        let decoded = manifest::decode(&manifest)?;
        for warning in decoded.warnings.iter() {
            warn!("Import for user {}: skipping {}", owner, warning);
        }

        let modpack_id = self.store.create(owner, decoded.draft).await?;
        info!(
            "Imported modpack {} for user {} ({} entries skipped)",
            modpack_id,
            owner,
            decoded.warnings.len()
        );
        Ok(modpack_id)
    }
}

/// Download name for an exported modpack.
pub fn archive_file_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|x| {
            if x.is_ascii_alphanumeric() || x == '_' || x == '-' {
                x
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.zip", stem)
}
