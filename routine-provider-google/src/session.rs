//! Keeps a valid Google access token, refreshing it from the stored session.
//!
//! The session is created out of band (any OAuth consent flow that writes
//! `session.toml`); this module only reads, refreshes and re-saves it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use routine_core::{AuthProvider, ServiceError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::app_config::{Credentials, base_dir};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Google OAuth session not found at {}.\n\n\
                Write one with access_token, refresh_token and expires_at (RFC 3339).",
                path.display()
            );
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read Google OAuth session from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse Google OAuth session from {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize session")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write session to {}", path.display()))?;

        // Owner-only, the file holds OAuth tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }
}

/// `AuthProvider` backed by `app_config.toml` and `session.toml`.
pub struct TokenFileAuth {
    credentials: Credentials,
    session_path: PathBuf,
    session: Mutex<SessionData>,
    http: reqwest::Client,
}

impl TokenFileAuth {
    pub fn load() -> Result<Self> {
        let dir = base_dir()?;
        Self::load_from(Credentials::load()?, dir.join("session.toml"))
    }

    pub fn load_from(credentials: Credentials, session_path: PathBuf) -> Result<Self> {
        let session = SessionData::load(&session_path)?;

        Ok(TokenFileAuth {
            credentials,
            session_path,
            session: Mutex::new(session),
            http: reqwest::Client::new(),
        })
    }

    async fn refresh(&self, current: &SessionData) -> Result<SessionData> {
        #[derive(Deserialize)]
        struct RefreshResponse {
            access_token: String,
            expires_in: i64,
            refresh_token: Option<String>,
        }

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", current.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Failed to send token refresh request")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to refresh token: {}", error_text);
        }

        let tokens: RefreshResponse = response
            .json()
            .await
            .context("Failed to parse token refresh response")?;

        Ok(SessionData {
            access_token: tokens.access_token,
            // Google rarely returns a new refresh token
            refresh_token: tokens
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| current.refresh_token.clone()),
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
        })
    }
}

impl AuthProvider for TokenFileAuth {
    async fn access_token(&self) -> Result<String, ServiceError> {
        let mut session = self.session.lock().await;

        if session.is_expired(Utc::now()) {
            debug!("Access token expired, refreshing");
            let refreshed = self
                .refresh(&session)
                .await
                .map_err(|e| ServiceError::Auth(format!("{e:#}")))?;
            refreshed
                .save(&self.session_path)
                .map_err(|e| ServiceError::Auth(format!("{e:#}")))?;
            *session = refreshed;
        }

        Ok(session.access_token.clone())
    }
}
