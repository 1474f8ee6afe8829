use anyhow::Context;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;

pub const USERNAME_KEY: &str = "ICLOUD_USERNAME";
pub const API_KEY_KEY: &str = "IMMICH_API_KEY";
pub const ADMIN_API_KEY_KEY: &str = "IMMICH_ADMIN_API_KEY";
pub const SERVER_URL_KEY: &str = "IMMICH_SERVER";

/// Account and server credentials read from the env file.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub api_key: String,
    pub admin_api_key: String,
    pub server_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("admin_api_key", &"<redacted>")
            .field("server_url", &self.server_url)
            .finish()
    }
}

impl Credentials {
    /// Load the four required values from a dotenv file.
    ///
    /// A variable already set in the process environment wins over the file,
    /// matching how `dotenvy::from_path` would populate the environment.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Credentials::load`] with `env` standing in for the process environment.
    fn load_with<E>(path: &Path, env: E) -> anyhow::Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        if !path.is_file() {
            anyhow::bail!("Credential file not found: {}", path.display());
        }

        let mut values = HashMap::new();
        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("Malformed line in {}", path.display()))?;
            values.insert(key, value);
        }

        Self::from_lookup(|key| env(key).or_else(|| values.get(key).cloned()))
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => anyhow::bail!("Missing {} in credential file", key),
            }
        };

        Ok(Self {
            username: required(USERNAME_KEY)?,
            api_key: required(API_KEY_KEY)?,
            admin_api_key: required(ADMIN_API_KEY_KEY)?,
            server_url: required(SERVER_URL_KEY)?,
        })
    }
}

/// Everything a run needs, built once at startup and passed to every phase.
#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub base_dir: PathBuf,
    pub downloader: String,
    pub uploader: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let credentials = Credentials::load(&expand_tilde(&cli.env_file))?;
        Ok(Self {
            credentials,
            base_dir: expand_tilde(&cli.base_dir),
            downloader: cli.downloader.clone(),
            uploader: cli.uploader.clone(),
            timeout: Duration::from_secs(cli.timeout),
        })
    }

    /// Flat pool the bulk download writes into.
    pub fn downloads_dir(&self) -> PathBuf {
        self.base_dir.join("downloads")
    }

    /// Parent of the per-album directories.
    pub fn albums_dir(&self) -> PathBuf {
        self.base_dir.join("albums")
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
pub(crate) fn test_config(base_dir: &Path) -> Config {
    Config {
        credentials: Credentials {
            username: "user@example.com".to_string(),
            api_key: "upload-key".to_string(),
            admin_api_key: "admin-key".to_string(),
            server_url: "http://immich.local:2283".to_string(),
        },
        base_dir: base_dir.to_path_buf(),
        downloader: "icloudpd".to_string(),
        uploader: "immich-go".to_string(),
        timeout: Duration::from_secs(60),
    }
}
