use std::{env::var, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use packsmith_core::archive::ArchiveLimits;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Default)]
pub struct ServerConfigFile {
    pub database_url: Option<String>,
    pub master_key: Option<String>,
    pub port: Option<u16>,
    pub lock_timeout_ms: Option<u64>,
    pub max_upload_size: Option<usize>,
    pub max_archive_entries: Option<usize>,
    pub max_manifest_size: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub master_key: String,
    pub port: u16,
    pub lock_timeout: Duration,
    pub max_upload_size: usize,
    pub archive_limits: ArchiveLimits,
}

impl ServerConfig {
    /// Reads `packsmith.server.toml` (or `PACKSMITH_CONFIG_PATH`) and lets
    /// environment variables override it.
    pub fn load() -> anyhow::Result<Self> {
        let path = var("PACKSMITH_CONFIG_PATH").unwrap_or("packsmith.server.toml".to_string());
        let file = match std::fs::read_to_string(&path) {
            Ok(text) => Some(
                toml::from_str::<ServerConfigFile>(&text)
                    .with_context(|| format!("invalid config file {}", path))?,
            ),
            Err(_) => None,
        };
        Self::resolve(file.unwrap_or_default(), |key| var(key).ok())
    }

    pub fn resolve(
        file: ServerConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let defaults = ArchiveLimits::default();
        let lock_timeout_ms =
            layered(&env, "PACKSMITH_LOCK_TIMEOUT_MS", file.lock_timeout_ms)?.unwrap_or(5000);
        // postgres reads a zero lock_timeout as "wait forever"
        if lock_timeout_ms == 0 {
            return Err(anyhow!("lock_timeout_ms must be at least 1"));
        }
        Ok(ServerConfig {
            database_url: env("DATABASE_URL")
                .or(file.database_url)
                .ok_or_else(|| anyhow!("No database URL set!"))?,
            master_key: env("PACKSMITH_MASTER_KEY")
                .or(file.master_key)
                .ok_or_else(|| anyhow!("No master key set!"))?,
            port: layered(&env, "PACKSMITH_PORT", file.port)?.unwrap_or(7040),
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            max_upload_size: layered(&env, "PACKSMITH_MAX_UPLOAD_SIZE", file.max_upload_size)?
                .unwrap_or(8 * 1024 * 1024),
            archive_limits: ArchiveLimits {
                max_entries: layered(
                    &env,
                    "PACKSMITH_MAX_ARCHIVE_ENTRIES",
                    file.max_archive_entries,
                )?
                .unwrap_or(defaults.max_entries),
                max_manifest_size: layered(
                    &env,
                    "PACKSMITH_MAX_MANIFEST_SIZE",
                    file.max_manifest_size,
                )?
                .unwrap_or(defaults.max_manifest_size),
            },
        })
    }
}

/// Environment value if set, otherwise the file value.
fn layered<T>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    file_value: Option<T>,
) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env(key) {
        Some(value) => Ok(Some(
            value
                .parse()
                .with_context(|| format!("invalid value for {}", key))?,
        )),
        None => Ok(file_value),
    }
}
