use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::db::StoreLocation;
use crate::library::LibraryConfig;
use crate::photo::RETENTION_SECONDS;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Keep photos in memory only; nothing survives the process.
    #[serde(default)]
    pub in_memory: bool,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ephemera")
        .join("photos.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            in_memory: false,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// How long a photo is kept after capture.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_ttl_seconds() -> u64 {
    RETENTION_SECONDS
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Extensions picked up when capturing a whole directory.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Frames larger than this on either side are scaled down.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "webp".to_string(),
        "bmp".to_string(),
        "tiff".to_string(),
    ]
}

fn default_max_dimension() -> u32 {
    2048
}

fn default_jpeg_quality() -> u8 {
    92 // same default a browser canvas uses for image/jpeg
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// `EPHEMERA_CONFIG` if set, otherwise `config.toml` in [`Config::config_dir`].
    pub fn config_path() -> PathBuf {
        match std::env::var_os("EPHEMERA_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => Self::config_dir().join("config.toml"),
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ephemera")
    }

    /// The settings the photo library needs, checked for sanity.
    pub fn library_config(&self) -> Result<LibraryConfig> {
        if self.retention.ttl_seconds == 0 {
            bail!("retention.ttl_seconds must be greater than zero");
        }
        let retention = i64::try_from(self.retention.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .context("retention.ttl_seconds is too large")?;

        let location = if self.store.in_memory {
            StoreLocation::Memory
        } else {
            StoreLocation::File(self.store.path.clone())
        };

        Ok(LibraryConfig {
            location,
            retention,
            busy_timeout: std::time::Duration::from_millis(self.store.busy_timeout_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::default_retention;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_keep_photos_two_days() {
        let config = Config::default();
        let library = config.library_config().unwrap();

        assert_eq!(library.retention, default_retention());
        assert!(matches!(library.location, StoreLocation::File(_)));
        assert_eq!(library.busy_timeout, std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [store]
            in_memory = true

            [retention]
            ttl_seconds = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.jpeg_quality, 92);
        let library = config.library_config().unwrap();
        assert_eq!(library.location, StoreLocation::Memory);
        assert_eq!(library.retention, Duration::seconds(60));
    }

    #[test]
    fn test_zero_retention_is_rejected() {
        let mut config = Config::default();
        config.retention.ttl_seconds = 0;
        assert!(config.library_config().is_err());

        config.retention.ttl_seconds = u64::MAX;
        assert!(config.library_config().is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ephemera").join("config.toml");
        let mut config = Config::default();
        config.retention.ttl_seconds = 3600;
        config.capture.max_dimension = 640;

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.retention.ttl_seconds, 3600);
        assert_eq!(loaded.capture.max_dimension, 640);
        assert_eq!(loaded.store.path, config.store.path);
    }
}
