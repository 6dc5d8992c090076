//! Configuration management for CrabTether
//!
//! Provides loading, saving and validation of the runtime options that
//! govern session setup, settings caching and discovery filtering. Every
//! value has a default matching the behaviour of a stock PTP/IP camera.

use crate::errors::{Result, TetherError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    pub session: SessionConfig,
    pub settings: SettingsConfig,
    pub discovery: DiscoveryConfig,
}

/// Connection establishment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Model entry looked up in the abilities catalog
    pub model_tag: String,
    /// Scheme prefixed to the network locator for the port lookup
    pub transport_scheme: String,
    /// Upper bound for the session-initialization handshake in milliseconds
    pub init_timeout_ms: u64,
    /// Settings scope holding the device model name
    pub pairing_scope_model: String,
    /// Settings scope holding the encoded pairing identifier
    pub pairing_scope_guid: String,
}

/// Settings tree caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Age after which a cached configuration snapshot is refetched
    pub freshness_window_ms: u64,
}

/// Discovery filtering and admission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// DNS-SD service types to browse
    pub service_types: Vec<String>,
    /// TXT property carrying the camera identifier
    pub vendor_property: String,
    /// Concurrent sessions admitted by the connection manager
    pub max_active_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_tag: "PTP/IP Camera".to_string(),
            transport_scheme: "ptpip".to_string(),
            init_timeout_ms: 10_000,
            pairing_scope_model: "gphoto2".to_string(),
            pairing_scope_guid: "ptp2_ip".to_string(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            freshness_window_ms: 2_000,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_types: [
                "_ptp._tcp.local.",
                "_http._tcp.local.",
                "_dlna._tcp.local.",
                "_daap._tcp.local.",
                "_dacp._tcp.local.",
                "_touch-able._tcp.local.",
                "_rsp._tcp.local.",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            vendor_property: "sid.canon.com".to_string(),
            max_active_sessions: 1,
        }
    }
}

impl SessionConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

impl SettingsConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_millis(self.freshness_window_ms)
    }
}

impl TetherConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| TetherError::Config(format!("Failed to read config file: {}", e)))?;

        let config: TetherConfig = toml::from_str(&contents)
            .map_err(|e| TetherError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TetherError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| TetherError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| TetherError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabtether.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.session.model_tag.is_empty() {
            return Err(TetherError::Config("Model tag must not be empty".to_string()));
        }
        if self.session.transport_scheme.is_empty() || self.session.transport_scheme.contains(':')
        {
            return Err(TetherError::Config(
                "Transport scheme must be a non-empty tag without ':'".to_string(),
            ));
        }
        if self.session.init_timeout_ms == 0 {
            return Err(TetherError::Config(
                "Init timeout must be greater than zero".to_string(),
            ));
        }
        if self.discovery.vendor_property.is_empty() {
            return Err(TetherError::Config(
                "Vendor property must not be empty".to_string(),
            ));
        }
        if self.discovery.max_active_sessions == 0 {
            return Err(TetherError::Config(
                "At least one active session must be allowed".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TetherConfig::default();
        assert_eq!(config.session.model_tag, "PTP/IP Camera");
        assert_eq!(config.settings.freshness_window(), Duration::from_secs(2));
        assert_eq!(config.discovery.max_active_sessions, 1);
        assert_eq!(config.discovery.service_types.len(), 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = TetherConfig::default();
        bad.discovery.max_active_sessions = 0;
        assert!(bad.validate().is_err());

        let mut bad_scheme = TetherConfig::default();
        bad_scheme.session.transport_scheme = "ptpip:".to_string();
        assert!(bad_scheme.validate().is_err());

        let mut bad_timeout = TetherConfig::default();
        bad_timeout.session.init_timeout_ms = 0;
        assert!(bad_timeout.validate().is_err());
    }

    #[test]
    fn test_config_toml_format() {
        let config = TetherConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[session]"));
        assert!(toml_string.contains("[settings]"));
        assert!(toml_string.contains("[discovery]"));
        assert!(toml_string.contains("freshness_window_ms"));
        assert!(toml_string.contains("vendor_property"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TetherConfig = toml::from_str("[settings]\nfreshness_window_ms = 500\n").unwrap();
        assert_eq!(config.settings.freshness_window_ms, 500);
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.discovery, DiscoveryConfig::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = TetherConfig::load_from_file("nonexistent_crabtether.toml");
        assert_eq!(result.unwrap(), TetherConfig::default());
    }
}
