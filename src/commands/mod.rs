pub mod clear;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use routine_core::{RoutineConfig, SyncOptions};
use routine_provider_google::{GoogleCalendar, TokenFileAuth};

/// Command-line values that take precedence over config.toml.
#[derive(Default)]
pub struct Overrides {
    pub file: Option<PathBuf>,
    pub timezone: Option<String>,
    pub calendar_id: Option<String>,
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
}

pub struct Settings {
    pub config: RoutineConfig,
    pub options: SyncOptions,
    pub source: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        let mut config = RoutineConfig::load()?;

        if let Some(timezone) = overrides.timezone {
            config.timezone = timezone;
        }
        if let Some(calendar_id) = overrides.calendar_id {
            config.calendar_id = calendar_id;
        }
        if let Some(batch_size) = overrides.batch_size {
            if batch_size == 0 {
                anyhow::bail!("--batch-size must be at least 1");
            }
            config.batch_size = batch_size;
        }
        if let Some(max_retries) = overrides.max_retries {
            config.max_retries = max_retries;
        }

        let options = config.sync_options()?;
        let source = overrides.file.or_else(|| config.source_path());

        Ok(Settings {
            config,
            options,
            source,
        })
    }

    pub fn source(&self) -> Result<PathBuf> {
        self.source.clone().context(
            "No routine file given.\n\n\
            Pass --file <PATH>, or set `source` in ~/.config/routine-sync/config.toml",
        )
    }
}

pub fn google_calendar() -> Result<GoogleCalendar<TokenFileAuth>> {
    let auth = TokenFileAuth::load().context("Could not load Google credentials")?;
    Ok(GoogleCalendar::new(auth))
}
