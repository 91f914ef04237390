//! Configuration management infrastructure.
//!
//! Optional TOML settings for the network side of signing: timeouts, the Key
//! Vault API version and timestamp transport retries. Digest algorithm
//! defaults deliberately do not live here; an absent digest name always
//! resolves to SHA-256.

use crate::infra::error::{SigningError, SigningResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Key Vault REST API version used when none is configured.
pub const DEFAULT_KEY_VAULT_API_VERSION: &str = "7.4";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfiguration {
    /// Timeout applied to every HTTP request (vault, token endpoint, TSA)
    pub network_timeout_seconds: u64,

    /// Key Vault REST API version
    pub key_vault_api_version: String,

    /// Attempts per timestamp request; timeouts are never retried
    pub timestamp_retry_attempts: usize,

    /// Delay between timestamp attempts
    pub timestamp_retry_delay_seconds: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for SignerConfiguration {
    fn default() -> Self {
        Self {
            network_timeout_seconds: 30,
            key_vault_api_version: DEFAULT_KEY_VAULT_API_VERSION.to_string(),
            timestamp_retry_attempts: 3,
            timestamp_retry_delay_seconds: 2,
            user_agent: format!("keyvault-signer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SignerConfiguration {
    #[must_use]
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_seconds)
    }

    #[must_use]
    pub fn timestamp_retry_delay(&self) -> Duration {
        Duration::from_secs(self.timestamp_retry_delay_seconds)
    }

    /// Validate configuration values
    pub fn validate(&self) -> SigningResult<()> {
        if self.network_timeout_seconds == 0 {
            return Err(SigningError::ConfigurationError(
                "Network timeout must be greater than 0".to_string(),
            ));
        }

        if self.timestamp_retry_attempts == 0 {
            return Err(SigningError::ConfigurationError(
                "Timestamp retry attempts must be greater than 0".to_string(),
            ));
        }

        if self.key_vault_api_version.trim().is_empty() {
            return Err(SigningError::ConfigurationError(
                "Key Vault API version must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> SigningResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> SigningResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("keyvault-signer").join("config.toml"))
        } else {
            Ok(PathBuf::from("keyvault-signer-config.toml"))
        }
    }

    /// Load the file if present, otherwise fall back to defaults without
    /// touching the filesystem.
    pub fn load_or_default(&self) -> SigningResult<SignerConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!(
                "No configuration file at {}, using defaults",
                self.config_path.display()
            );
            Ok(SignerConfiguration::default())
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> SigningResult<SignerConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = SignerConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> SigningResult<SignerConfiguration> {
        log::debug!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: SignerConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &SignerConfiguration) -> SigningResult<()> {
        config.validate()?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    SigningError::ConfigurationError(format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        log::info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> SigningResult<()> {
        let mut config = self.load_or_default()?;

        match key {
            "network_timeout_seconds" => {
                config.network_timeout_seconds = parse_number(key, value)?;
            }
            "key_vault_api_version" => {
                config.key_vault_api_version = value.trim().to_string();
            }
            "timestamp_retry_attempts" => {
                config.timestamp_retry_attempts = parse_number(key, value)?;
            }
            "timestamp_retry_delay_seconds" => {
                config.timestamp_retry_delay_seconds = parse_number(key, value)?;
            }
            "user_agent" => {
                config.user_agent = value.to_string();
            }
            _ => {
                return Err(SigningError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export the effective configuration
    pub fn export_config(&self, format: ExportFormat) -> SigningResult<String> {
        let config = self.load_or_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("JSON export failed: {e}"))),
        }
    }
}

/// Configuration export formats
#[derive(Debug, Clone, Copy)]
pub enum ExportFormat {
    Toml,
    Json,
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> SigningResult<T> {
    value.trim().parse().map_err(|_| {
        SigningError::ConfigurationError(format!("Invalid numeric value for {key}: {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_configuration() {
        let config = SignerConfiguration::default();
        assert_eq!(config.network_timeout_seconds, 30);
        assert_eq!(config.key_vault_api_version, "7.4");
        assert!(config.user_agent.starts_with("keyvault-signer/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SignerConfiguration = toml::from_str("network_timeout_seconds = 5").unwrap();
        assert_eq!(config.network_timeout(), Duration::from_secs(5));
        assert_eq!(config.timestamp_retry_attempts, 3);
    }

    #[test]
    fn test_config_manager_with_temp_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let config = manager.load_or_default().unwrap();
        assert!(!config_path.exists());

        let created = manager.load_or_create_default().unwrap();
        assert!(config_path.exists());
        assert_eq!(config, created);

        manager.update_value("network_timeout_seconds", "12").unwrap();
        assert_eq!(manager.load().unwrap().network_timeout_seconds, 12);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        assert!(manager.update_value("network_timeout_seconds", "0").is_err());
        assert!(manager.update_value("timestamp_retry_attempts", "many").is_err());
        assert!(manager.update_value("default_digest", "sha1").is_err());
    }

    #[test]
    fn test_export_formats() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        let toml_out = manager.export_config(ExportFormat::Toml).unwrap();
        assert!(toml_out.contains("key_vault_api_version"));

        let json_out = manager.export_config(ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json_out).unwrap();
        assert_eq!(value["network_timeout_seconds"], 30);
    }
}
