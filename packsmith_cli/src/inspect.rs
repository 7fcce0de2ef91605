use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use colored::Colorize;
use log::{info, warn};
use packsmith_core::{
    archive::{self, ArchiveLimits},
    manifest::{self, DecodedManifest},
};

/// Check a modpack archive locally, the same way the server would import it
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Archive to inspect
    archive: PathBuf,

    /// Maximum number of entries accepted in the archive
    #[arg(long, default_value_t = ArchiveLimits::default().max_entries)]
    max_entries: usize,

    /// Maximum decompressed size of manifest.json in bytes
    #[arg(long, default_value_t = ArchiveLimits::default().max_manifest_size)]
    max_manifest_size: u64,
}

impl InspectCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        let bytes = std::fs::read(&self.archive)
            .with_context(|| format!("Cannot read {}", self.archive.to_string_lossy()))?;
        let limits = ArchiveLimits {
            max_entries: self.max_entries,
            max_manifest_size: self.max_manifest_size,
        };
        let decoded = inspect(&bytes, &limits)?;

        info!(
            "{} ({}) for {}",
            decoded.draft.name.cyan(),
            self.archive.to_string_lossy(),
            decoded.draft.game_version.cyan()
        );
        if let Some(description) = decoded.draft.description.as_ref().filter(|x| !x.is_empty()) {
            info!("{}", description);
        }
        for reference in decoded.draft.mods.iter() {
            let flag = if reference.required {
                "required".green()
            } else {
                "optional".yellow()
            };
            info!(
                "[{}] project {} file {}",
                flag, reference.project_id, reference.file_id
            );
        }
        for warning in decoded.warnings.iter() {
            warn!("[{}] Skipped {}", "!".red(), warning);
        }
        info!(
            "{} {} mods, {} skipped",
            "OK".green(),
            decoded.draft.mods.len(),
            decoded.warnings.len()
        );
        Ok(())
    }
}

pub fn inspect(bytes: &[u8], limits: &ArchiveLimits) -> anyhow::Result<DecodedManifest> {
    let manifest = archive::unpack(bytes, limits)?;
    Ok(manifest::decode(&manifest)?)
}
