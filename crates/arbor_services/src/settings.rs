//! Settings management

use arbor_core::config::{ConfigError, EngineConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid engine settings: {0}")]
    Invalid(#[from] ConfigError),
}

/// Everything the runtime reads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive string, e.g. `info,arbor_core=debug`
    pub filter: String,
    pub ansi: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}

impl Settings {
    /// Read and validate a JSON settings file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&text)?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.engine.validate()?;
        Ok(settings)
    }

    pub fn to_json_pretty(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        fs::write(path, self.to_json_pretty()?).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fill_in_defaults() {
        let settings = Settings::from_json(r#"{ "engine": { "max_delete_passes": 3 } }"#).unwrap();
        assert_eq!(settings.engine.max_delete_passes, 3);
        assert_eq!(settings.engine.collection_max_instances, 1024);
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn invalid_engine_values_are_rejected() {
        let err = Settings::from_json(r#"{ "engine": { "collection_max_instances": 40000 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid(ConfigError::CapacityTooLarge { .. })
        ));
        assert!(matches!(
            Settings::from_json("{ not json").unwrap_err(),
            SettingsError::Parse(_)
        ));
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.logging.filter = "debug".to_string();
        settings.engine.scale_along_z = true;

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        match Settings::load(&path).unwrap_err() {
            SettingsError::Io { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error {other}"),
        }
    }
}
