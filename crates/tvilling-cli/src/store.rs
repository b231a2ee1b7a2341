//! Settings persistence and configuration loading.
//!
//! The settings record is read once at startup and written when asked to
//! save. A missing or unreadable record is not an error: the session starts
//! from the defaults and says so in the log.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use tvilling_engine::EngineConfig;
use tvilling_proto::Settings;

use crate::error::CliError;

/// File-backed settings record.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record, falling back to the defaults.
    pub fn load(&self) -> Settings {
        match self.try_load() {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "no saved settings");
                Settings::default()
            },
            Err(e) => {
                tracing::warn!(error = %e, "ignoring saved settings");
                Settings::default()
            },
        }
    }

    /// Read the record; `None` if the file does not exist.
    ///
    /// A record whose values do not form a valid network profile is
    /// rejected here rather than when applied.
    pub fn try_load(&self) -> Result<Option<Settings>, CliError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CliError::Io { path: self.path.clone(), source }),
        };

        let settings = Settings::from_json(&json)?;
        settings.profile()?;
        Ok(Some(settings))
    }

    /// Write the record, replacing any previous one.
    pub fn save(&self, settings: &Settings) -> Result<(), CliError> {
        let json = settings.to_json()?;
        fs::write(&self.path, json)
            .map_err(|source| CliError::Io { path: self.path.clone(), source })?;
        tracing::info!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// Milliseconds since the Unix epoch, for the record's timestamp.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Read an engine configuration from a TOML file.
///
/// Fields the file does not name keep their defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
    let config: EngineConfig = toml::from_str(&text)?;
    config.validate()?;
    Ok(config)
}
