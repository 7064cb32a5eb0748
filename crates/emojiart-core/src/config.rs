//! Editor configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid zoom range {min}..{max}")]
    ZoomRange { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Font size given to glyphs created by a drop.
    #[serde(default = "default_emoji_size")]
    pub default_emoji_size: f64,

    /// Minimum time between autosaves. Zero saves after every intent.
    #[serde(default)]
    pub autosave_interval_ms: u64,

    /// Directory for keyed documents. Defaults to the platform data dir.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// Background fetch timeout. Unset means no timeout.
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,

    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,

    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
}

fn default_emoji_size() -> f64 {
    40.0
}

fn default_min_zoom() -> f64 {
    0.05
}

fn default_max_zoom() -> f64 {
    20.0
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_emoji_size: default_emoji_size(),
            autosave_interval_ms: 0,
            storage_dir: None,
            fetch_timeout_secs: None,
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
        }
    }
}

impl EditorConfig {
    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Platform config location, e.g. `~/.config/emojiart/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("emojiart").join("config.json"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let valid = self.min_zoom.is_finite()
            && self.max_zoom.is_finite()
            && self.min_zoom > 0.0
            && self.min_zoom <= self.max_zoom;
        if valid {
            Ok(())
        } else {
            Err(ConfigError::ZoomRange {
                min: self.min_zoom,
                max: self.max_zoom,
            })
        }
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    /// Directory for keyed documents, falling back to the platform default.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir
            .clone()
            .or_else(|| crate::storage::FileStorage::default_path().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = EditorConfig::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.autosave_interval(), Duration::ZERO);
        assert_eq!(config.fetch_timeout(), None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"default_emoji_size": 64, "fetch_timeout_secs": 10}"#).unwrap();

        let config = EditorConfig::load(&path).unwrap();
        assert!((config.default_emoji_size - 64.0).abs() < f64::EPSILON);
        assert_eq!(config.fetch_timeout(), Some(Duration::from_secs(10)));
        assert!((config.max_zoom - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            EditorConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_inverted_zoom_range_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"min_zoom": 4.0, "max_zoom": 2.0}"#).unwrap();

        assert!(matches!(
            EditorConfig::load(&path),
            Err(ConfigError::ZoomRange { .. })
        ));
    }

    #[test]
    fn test_explicit_storage_dir_wins() {
        let config = EditorConfig {
            storage_dir: Some(PathBuf::from("/tmp/art")),
            ..Default::default()
        };
        assert_eq!(config.storage_dir(), Some(PathBuf::from("/tmp/art")));
    }
}
