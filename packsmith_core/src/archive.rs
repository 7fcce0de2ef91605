//! Single-entry zip container carrying a manifest.

use std::io::{Cursor, Read, Write};

use zip::{result::ZipError, write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::MANIFEST_FILE_NAME;

/// Ceilings applied when reading untrusted archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    pub max_entries: usize,
    pub max_manifest_size: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entries: 16,
            max_manifest_size: 4 * 1024 * 1024,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("not a valid archive: {0}")]
    Invalid(ZipError),
    #[error("archive does not contain manifest.json")]
    MissingManifest,
    #[error("archive has {found} entries, at most {max} allowed")]
    TooManyEntries { found: usize, max: usize },
    #[error("manifest.json exceeds {max} bytes")]
    ManifestTooLarge { max: u64 },
    #[error("failed to decompress manifest.json: {0}")]
    Corrupt(std::io::Error),
    #[error("failed to write archive: {0}")]
    Write(ZipError),
}

impl ArchiveError {
    /// Whether the error was caused by the archive bytes rather than by us.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, ArchiveError::Write(_))
    }
}

/// Wraps a manifest into a zip with one `manifest.json` entry. The entry
/// timestamp is pinned so equal manifests produce equal archives.
pub fn pack(manifest: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(MANIFEST_FILE_NAME, options)
        .map_err(ArchiveError::Write)?;
    writer
        .write_all(manifest)
        .map_err(|e| ArchiveError::Write(ZipError::Io(e)))?;
    let cursor = writer.finish().map_err(ArchiveError::Write)?;
    Ok(cursor.into_inner())
}

/// Extracts the `manifest.json` entry, enforcing `limits` on both the
/// declared and the actual decompressed size.
pub fn unpack(archive: &[u8], limits: &ArchiveLimits) -> Result<Vec<u8>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(archive)).map_err(ArchiveError::Invalid)?;
    if archive.len() > limits.max_entries {
        return Err(ArchiveError::TooManyEntries {
            found: archive.len(),
            max: limits.max_entries,
        });
    }

    let entry = match archive.by_name(MANIFEST_FILE_NAME) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(ArchiveError::MissingManifest),
        Err(e) => return Err(ArchiveError::Invalid(e)),
    };
    if entry.size() > limits.max_manifest_size {
        return Err(ArchiveError::ManifestTooLarge {
            max: limits.max_manifest_size,
        });
    }

    let mut manifest = Vec::with_capacity(entry.size() as usize);
    entry
        .take(limits.max_manifest_size + 1)
        .read_to_end(&mut manifest)
        .map_err(ArchiveError::Corrupt)?;
    if manifest.len() as u64 > limits.max_manifest_size {
        return Err(ArchiveError::ManifestTooLarge {
            max: limits.max_manifest_size,
        });
    }
    Ok(manifest)
}
