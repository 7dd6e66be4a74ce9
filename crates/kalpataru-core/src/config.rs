use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{KalpataruError, Result};

/// Top-level configuration for the Kalpataru client.
///
/// Loaded from `~/.kalpataru/config.toml` by default. Every section has
/// defaults, so a partial or empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KalpataruConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl KalpataruConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: KalpataruConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| KalpataruError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the history database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.kalpataru/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Remote assistant backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL; `/chat`, `/diagnose` and `/upload` are appended to it.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://kalpataru-backend.onrender.com".to_string(),
            timeout_secs: 60,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Conversation log persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Key under which the serialized log is stored.
    pub storage_key: String,
    /// SQLite file name inside `general.data_dir`.
    pub db_file: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage_key: "chatHistory".to_string(),
            db_file: "kalpataru.db".to_string(),
        }
    }
}

/// Speech input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// BCP 47 locale handed to the speech recognizer.
    pub recognition_locale: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            recognition_locale: "en-IN".to_string(),
        }
    }
}

/// What to do when a request is submitted while another is still pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPolicy {
    /// Refuse the new submission and keep the pending one.
    #[default]
    Reject,
    /// Cancel the pending request, then issue the new one.
    Replace,
}

/// Session manager behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub request_policy: RequestPolicy,
}
