use std::{path::PathBuf, time::Instant};

use anyhow::{anyhow, Context};
use clap::Args;
use colored::Colorize;
use log::info;
use packsmith_core::api::{ErrorBody, ModpackImportResponse};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "packsmith.cli.toml";

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Server URL, overrides packsmith.cli.toml
    #[arg(long)]
    server: Option<String>,

    /// API token, overrides packsmith.cli.toml
    #[arg(long)]
    key: Option<String>,
}

#[derive(Serialize, Deserialize, Default)]
pub struct ClientConfig {
    pub server_url: Option<String>,
    pub api_key: Option<String>,
}

/// Download a modpack as a manifest archive
#[derive(Args, Debug)]
pub struct ExportCommand {
    /// Modpack to export
    modpack_id: i64,

    /// Output file, defaults to the name suggested by the server
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    server: ServerArgs,
}

/// Upload a manifest archive as a new modpack
#[derive(Args, Debug)]
pub struct ImportCommand {
    /// Archive containing manifest.json
    archive: PathBuf,

    #[command(flatten)]
    server: ServerArgs,
}

struct Connection {
    server_url: String,
    client: reqwest::Client,
}

impl ServerArgs {
    fn connect(&self) -> anyhow::Result<Connection> {
        let config = match std::fs::read_to_string(CONFIG_FILE) {
            Ok(text) => toml::from_str::<ClientConfig>(&text)
                .with_context(|| format!("Invalid {}", CONFIG_FILE))?,
            Err(_) => ClientConfig::default(),
        };
        let server_url = self
            .server
            .clone()
            .or(config.server_url)
            .ok_or_else(|| anyhow!("No server URL set (--server or {})", CONFIG_FILE))?;
        let api_key = self
            .key
            .clone()
            .or(config.api_key)
            .ok_or_else(|| anyhow!("No API key set (--key or {})", CONFIG_FILE))?;

        let mut auth_value =
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", api_key))?;
        auth_value.set_sensitive(true);
        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.append(reqwest::header::AUTHORIZATION, auth_value);
        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()?;

        Ok(Connection {
            server_url: server_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

/// Turns a non-success response into an error carrying the server's code.
async fn check(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(anyhow!("Invalid API key"));
    }
    match response.json::<ErrorBody>().await {
        Ok(body) => Err(anyhow!(
            "Server returned {}: {}{}",
            status,
            body.error,
            body.message.map(|x| format!(" ({})", x)).unwrap_or_default()
        )),
        Err(_) => Err(anyhow!("Server returned {}", status)),
    }
}

/// File name from `Content-Disposition: attachment; filename="..."`.
pub fn attachment_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|x| x.strip_prefix("filename="))
        .map(|x| x.trim_matches('"').to_string())
        .filter(|x| !x.is_empty() && !x.contains(['/', '\\']))
}

impl ExportCommand {
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let connection = self.server.connect()?;
        let instant = Instant::now();

        let response = connection
            .client
            .get(format!(
                "{}/modpacks/{}/export",
                connection.server_url, self.modpack_id
            ))
            .send()
            .await?;
        let response = check(response).await?;

        let suggested = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|x| x.to_str().ok())
            .and_then(attachment_name);
        let output = self.output.clone().unwrap_or_else(|| {
            PathBuf::from(suggested.unwrap_or(format!("modpack-{}.zip", self.modpack_id)))
        });
        let bytes = response.bytes().await?;
        std::fs::write(&output, &bytes)
            .with_context(|| format!("Cannot write {}", output.to_string_lossy()))?;

        info!(
            "{} Exported modpack {} to {} ({} bytes) in {:.2}s",
            "SUCCESS!".green(),
            self.modpack_id,
            output.to_string_lossy().cyan(),
            bytes.len(),
            instant.elapsed().as_secs_f32()
        );
        Ok(())
    }
}

impl ImportCommand {
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let connection = self.server.connect()?;
        let data = std::fs::read(&self.archive)
            .with_context(|| format!("Cannot read {}", self.archive.to_string_lossy()))?;
        let file_name = self
            .archive
            .file_name()
            .map(|x| x.to_string_lossy().to_string())
            .unwrap_or("modpack.zip".to_string());

        info!("[{}] Uploading {}...", "@".purple(), file_name.purple());
        let part = reqwest::multipart::Part::bytes(data).file_name(file_name);
        let multipart = reqwest::multipart::Form::new().part("file", part);
        let response = connection
            .client
            .post(format!("{}/modpacks/import", connection.server_url))
            .multipart(multipart)
            .send()
            .await?;
        let imported: ModpackImportResponse = check(response).await?.json().await?;

        info!(
            "{} Imported as modpack {}",
            "SUCCESS!".green(),
            imported.modpack_id.to_string().cyan()
        );
        Ok(())
    }
}
