//! Configuration parsing and management for irislink

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, IrislinkError};
use crate::osc::EyeId;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub osc: OscConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            osc: OscConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, IrislinkError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e)))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, IrislinkError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, IrislinkError> {
        // Try config paths in order
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), IrislinkError> {
        if self.osc.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "osc.port".to_string(),
                message: "Port must be greater than 0".to_string(),
            }
            .into());
        }

        if self.osc.receiver_enabled {
            if self.osc.receiver_port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "osc.receiver_port".to_string(),
                    message: "Port must be greater than 0".to_string(),
                }
                .into());
            }

            for (field, address) in [
                ("osc.recenter_address", &self.osc.recenter_address),
                ("osc.recalibrate_address", &self.osc.recalibrate_address),
            ] {
                if !address.starts_with('/') {
                    return Err(ConfigError::InvalidValue {
                        field: field.to_string(),
                        message: "OSC addresses must start with '/'".to_string(),
                    }
                    .into());
                }
            }
        }

        if let Some(source) = &self.capture.source {
            if source.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "capture.source".to_string(),
                    message: "Source must not be blank; omit it instead".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Camera capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture source: an HTTP MJPEG stream URL, or a wired camera index
    /// or device path. Unset means wait until one is provided.
    pub source: Option<String>,
    /// Which eye this camera observes
    pub eye: EyeId,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: None,
            eye: EyeId::Both,
        }
    }
}

/// OSC output and command-receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    /// VRChat OSC host
    pub address: String,
    /// VRChat OSC input port
    pub port: u16,
    /// Enable the avatar-to-tracker command listener
    pub receiver_enabled: bool,
    /// Command listener port
    pub receiver_port: u16,
    /// Parameter address that triggers a recenter
    pub recenter_address: String,
    /// Parameter address that triggers a recalibration
    pub recalibrate_address: String,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 9000,
            receiver_enabled: false,
            receiver_port: 9001,
            recenter_address: "/avatar/parameters/etvr_recenter".to_string(),
            recalibrate_address: "/avatar/parameters/etvr_recalibrate".to_string(),
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("irislink");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/irislink");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/irislink");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("irislink");
        }
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.osc.address, "127.0.0.1");
        assert_eq!(config.osc.port, 9000);
        assert!(!config.osc.receiver_enabled);
        assert!(config.capture.source.is_none());
        assert_eq!(config.capture.eye, EyeId::Both);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [capture]
            source = "http://192.168.1.40/"
            eye = "left"

            [osc]
            port = 9010
            receiver_enabled = true
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.capture.source.as_deref(), Some("http://192.168.1.40/"));
        assert_eq!(config.capture.eye, EyeId::Left);
        assert_eq!(config.osc.port, 9010);
        assert!(config.osc.receiver_enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.osc.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.osc.receiver_enabled = true;
        config.osc.recenter_address = "etvr_recenter".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.capture.source = Some("  ".to_string());
        assert!(config.validate().is_err());
    }
}
