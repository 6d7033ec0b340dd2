use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub api_url: String,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn config_path() -> std::path::PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("vitalog");
    config_dir.join("config.json")
}

pub fn load_credentials() -> Option<StoredCredentials> {
    let path = config_path();
    let data = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&data).ok()
}

pub fn save_credentials(creds: &StoredCredentials) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string_pretty(creds)?;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&path)?;
    file.write_all(data.as_bytes())?;

    Ok(())
}

/// Token precedence: VITALOG_API_KEY, then the stored credentials file.
/// Tokens are minted by the external identity provider, so an expired stored
/// token cannot be refreshed here.
pub fn resolve_token() -> Result<String, Box<dyn std::error::Error>> {
    if let Ok(key) = std::env::var("VITALOG_API_KEY") {
        return Ok(key);
    }

    if let Some(creds) = load_credentials() {
        if let Some(expires_at) = creds.expires_at {
            let buffer = chrono::Duration::minutes(5);
            if Utc::now() + buffer >= expires_at {
                return Err(
                    "Stored access token expired. Run `vitalog-mcp login` with a fresh token \
                     or set VITALOG_API_KEY."
                        .into(),
                );
            }
        }
        return Ok(creds.access_token);
    }

    Err("No credentials found. Run `vitalog-mcp login` or set VITALOG_API_KEY.".into())
}

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

#[cfg(not(unix))]
trait OpenOptionsExt {
    fn mode(&mut self, _mode: u32) -> &mut Self;
}

#[cfg(not(unix))]
impl OpenOptionsExt for std::fs::OpenOptions {
    fn mode(&mut self, _mode: u32) -> &mut Self {
        self
    }
}
