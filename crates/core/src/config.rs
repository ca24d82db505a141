use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Settings;

/// Configuration manager for patchbay settings.
/// Separates the schema (available options with validation) from persisted
/// values. Stored as config.json under the platform config directory by
/// default, falling back to the working directory.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub api: ApiConfigSchema,
    pub polling: PollingConfigSchema,
    pub edits: EditConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfigSchema {
    pub api_base_url: ConfigOption<String>,
    pub request_timeout_secs: ConfigOption<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfigSchema {
    pub universe: ConfigOption<u16>,
    pub poll_interval_secs: ConfigOption<u32>,
    pub resume_grace_ms: ConfigOption<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditConfigSchema {
    pub default_fade_ms: ConfigOption<u32>,
}

/// Configuration option with validation and available choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub description: String,
    pub requires_restart: bool,
}

/// Persisted configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager. If no path is provided, uses
    /// `<config dir>/patchbay/config.json`, or `./config.json` when the
    /// platform has no config directory.
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join("patchbay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        });

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from the configuration file, creating it with defaults
    /// if it does not exist.
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}; using defaults for new settings",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to the configuration file.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            modified_at: chrono::Utc::now().to_rfc3339(),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Update settings and save to file.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get the configuration schema with available options.
    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            api: ApiConfigSchema {
                api_base_url: ConfigOption {
                    default: "http://127.0.0.1:8089".to_string(),
                    valid_range: None,
                    description: "Base URL of the remote lighting backend".to_string(),
                    requires_restart: true,
                },
                request_timeout_secs: ConfigOption {
                    default: 10,
                    valid_range: Some((1, 120)),
                    description: "HTTP request timeout in seconds".to_string(),
                    requires_restart: true,
                },
            },
            polling: PollingConfigSchema {
                universe: ConfigOption {
                    default: 1,
                    valid_range: Some((1, 255)),
                    description: "DMX universe whose live levels are polled".to_string(),
                    requires_restart: true,
                },
                poll_interval_secs: ConfigOption {
                    default: 5,
                    valid_range: Some((1, 60)),
                    description: "Live channel value poll interval in seconds".to_string(),
                    requires_restart: false,
                },
                resume_grace_ms: ConfigOption {
                    default: 750,
                    valid_range: Some((0, 10_000)),
                    description:
                        "Delay after the last fader edit before polling resumes, in milliseconds"
                            .to_string(),
                    requires_restart: false,
                },
            },
            edits: EditConfigSchema {
                default_fade_ms: ConfigOption {
                    default: 200,
                    valid_range: Some((0, 60_000)),
                    description: "Fade time applied to committed channel edits".to_string(),
                    requires_restart: false,
                },
            },
        }
    }

    /// Validate settings against the schema.
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        if settings.api_base_url.is_empty() {
            errors.push("api_base_url must not be empty".to_string());
        }

        if let Some((min, max)) = schema.api.request_timeout_secs.valid_range {
            if settings.request_timeout_secs < min || settings.request_timeout_secs > max {
                errors.push(format!(
                    "request_timeout_secs must be between {} and {}",
                    min, max
                ));
            }
        }

        if let Some((min, max)) = schema.polling.universe.valid_range {
            if settings.universe < min || settings.universe > max {
                errors.push(format!("universe must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.polling.poll_interval_secs.valid_range {
            if settings.poll_interval_secs < min || settings.poll_interval_secs > max {
                errors.push(format!(
                    "poll_interval_secs must be between {} and {}",
                    min, max
                ));
            }
        }

        if let Some((min, max)) = schema.polling.resume_grace_ms.valid_range {
            if settings.resume_grace_ms < min || settings.resume_grace_ms > max {
                errors.push(format!(
                    "resume_grace_ms must be between {} and {}",
                    min, max
                ));
            }
        }

        if let Some((min, max)) = schema.edits.default_fade_ms.valid_range {
            if settings.default_fade_ms < min || settings.default_fade_ms > max {
                errors.push(format!(
                    "default_fade_ms must be between {} and {}",
                    min, max
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults.
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

/// Configuration error types.
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Failed to write config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "Failed to serialize config: {}", msg),
            ConfigError::ValidationError(errors) => {
                write!(f, "Config validation errors: {}", errors.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_config_manager_new() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.config_path(), config_path);
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));

        let mut settings = Settings::default();
        settings.poll_interval_secs = 10;
        settings.api_base_url = "http://10.1.1.5:9000".to_string();

        manager.update_settings(settings.clone()).unwrap();

        let mut manager2 = ConfigManager::new(Some(config_path));
        let loaded_settings = manager2.load().unwrap();

        assert_eq!(loaded_settings.poll_interval_secs, 10);
        assert_eq!(loaded_settings.api_base_url, "http://10.1.1.5:9000");
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));
        let settings = manager.load().unwrap();

        assert!(config_path.exists());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        assert!(ConfigManager::validate_settings(&settings).is_ok());

        settings.poll_interval_secs = 0; // Outside valid range
        assert!(ConfigManager::validate_settings(&settings).is_err());

        settings.poll_interval_secs = 5;
        settings.api_base_url = String::new();
        assert!(ConfigManager::validate_settings(&settings).is_err());
    }

    #[test]
    fn test_schema_completeness() {
        let schema = ConfigManager::schema();

        assert!(!schema.api.api_base_url.default.is_empty());
        assert!(schema.polling.poll_interval_secs.valid_range.is_some());
        assert!(schema.polling.resume_grace_ms.valid_range.is_some());
        assert!(schema.edits.default_fade_ms.valid_range.is_some());
    }
}
