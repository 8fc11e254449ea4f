//! Layered configuration at ~/.config/routine-sync/config.toml
//!
//! Built-in defaults, then the optional config file, then `ROUTINE_SYNC_*`
//! environment variables. Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_CALENDAR_ID, DEFAULT_MAX_RETRIES, DEFAULT_TIMEZONE, WATCH_DEBOUNCE_MS,
};
use crate::error::{RoutineError, RoutineResult};
use crate::pipeline::SyncOptions;

pub const APP_NAME: &str = "routine-sync";
const ENV_PREFIX: &str = "ROUTINE_SYNC";

#[derive(Debug, Clone, Deserialize)]
pub struct RoutineConfig {
    pub calendar_id: String,
    /// IANA zone name
    pub timezone: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub debounce_ms: u64,
    /// Routine file to use when none is given on the command line
    #[serde(default)]
    pub source: Option<PathBuf>,
}

impl RoutineConfig {
    /// ~/.config/routine-sync
    pub fn config_dir() -> RoutineResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or_else(|| RoutineError::Config("Could not determine config directory".into()))
    }

    pub fn config_path() -> RoutineResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn load() -> RoutineResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load with `path` as the config file. A missing file is not an error.
    pub fn load_from(path: &Path) -> RoutineResult<Self> {
        let config: RoutineConfig = Config::builder()
            .set_default("calendar_id", DEFAULT_CALENDAR_ID)
            .and_then(|b| b.set_default("timezone", DEFAULT_TIMEZONE))
            .and_then(|b| b.set_default("batch_size", DEFAULT_BATCH_SIZE as i64))
            .and_then(|b| b.set_default("max_retries", i64::from(DEFAULT_MAX_RETRIES)))
            .and_then(|b| b.set_default("debounce_ms", WATCH_DEBOUNCE_MS as i64))
            .map_err(|e| RoutineError::Config(e.to_string()))?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| RoutineError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| RoutineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> RoutineResult<()> {
        if self.batch_size == 0 {
            return Err(RoutineError::Config("batch_size must be at least 1".into()));
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> RoutineResult<Tz> {
        parse_timezone(&self.timezone)
    }

    /// The configured source file with `~` expanded.
    pub fn source_path(&self) -> Option<PathBuf> {
        self.source
            .as_ref()
            .map(|p| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn sync_options(&self) -> RoutineResult<SyncOptions> {
        Ok(SyncOptions {
            calendar_id: self.calendar_id.clone(),
            timezone: self.tz()?,
            batch_size: self.batch_size,
            max_retries: self.max_retries,
        })
    }
}

pub fn parse_timezone(name: &str) -> RoutineResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| RoutineError::UnknownTimezone(name.to_string()))
}
