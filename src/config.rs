use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PressError, Result};
use crate::palette::DisplayColors;
use crate::plan::Calibration;

/// Persisted settings: last controller address, preview colors and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub poll_rate_ms: u32,
    pub palette: DisplayColors,
    pub calibration: Calibration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "192.168.0.1".to_string(),
            poll_rate_ms: 31,
            palette: DisplayColors::default(),
            calibration: Calibration::default(),
        }
    }
}

/// `config/config.toml` next to the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("config").join("config.toml")
}

impl Config {
    /// Read the document at `path`. A missing file yields the defaults and
    /// writes them out for next time.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = toml::from_str(&content)
                    .map_err(|e| PressError::Config(format!("{}: {}", path.display(), e)))?;
                debug!(path = %path.display(), "config loaded");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Config::default();
                config.save(path)?;
                info!(path = %path.display(), "wrote default config");
                Ok(config)
            }
            Err(e) => Err(PressError::Config(format!("read {}: {}", path.display(), e))),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| PressError::Config(format!("create {}: {}", dir.display(), e)))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| PressError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| PressError::Config(format!("write {}: {}", path.display(), e)))
    }

    /// Store `host` if it differs from the saved one. Returns whether the
    /// file was rewritten.
    pub fn remember_host(&mut self, path: &Path, host: &str) -> Result<bool> {
        if self.host == host {
            return Ok(false);
        }
        self.host = host.to_string();
        self.save(path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("config.toml");
        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "host = \"10.0.0.7\"\n[palette]\nred = [1, 2, 3]\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.poll_rate_ms, 31);
        assert_eq!(config.palette.red, [1, 2, 3]);
        assert_eq!(config.palette.blue, DisplayColors::default().blue);
        assert_eq!(config.calibration.ink_budget, 10_000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_rate_ms = \"fast\"").unwrap();
        assert!(matches!(Config::load(&path), Err(PressError::Config(_))));
    }

    #[test]
    fn remember_host_only_writes_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::load(&path).unwrap();
        assert!(!config.remember_host(&path, "192.168.0.1").unwrap());
        assert!(config.remember_host(&path, "192.168.1.20").unwrap());
        assert_eq!(Config::load(&path).unwrap().host, "192.168.1.20");
    }
}
