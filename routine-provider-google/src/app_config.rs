//! User-provided OAuth client credentials, stored at
//!   ~/.config/routine-sync/google/app_config.toml

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

pub fn base_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Could not determine config directory")?
        .join("routine-sync")
        .join("google"))
}

impl Credentials {
    pub fn load() -> Result<Self> {
        Self::load_from(&base_dir()?.join("app_config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Google credentials not found.\n\n\
                Create {} with:\n\n\
                client_id = \"your-client-id.apps.googleusercontent.com\"\n\
                client_secret = \"your-client-secret\"\n\n\
                See https://console.cloud.google.com/apis/credentials for setup.",
                path.display()
            );
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_explains_setup() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::load_from(&dir.path().join("app_config.toml")).unwrap_err();

        assert!(err.to_string().contains("client_id = "));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_config.toml");
        std::fs::write(&path, "client_id = \"abc\"\nclient_secret = \"xyz\"\n").unwrap();

        let creds = Credentials::load_from(&path).unwrap();
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.client_secret, "xyz");
    }
}
