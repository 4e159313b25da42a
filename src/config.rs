//! Configuration file handling for ai-hub.
//!
//! Loads configuration from `<config dir>/ai-hub/config.toml` or a custom path.
//! Every section is optional and falls back to the public provider endpoints.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::PollPolicy;

pub const DEFAULT_FAL_BASE_URL: &str = "https://queue.fal.run";
pub const DEFAULT_VYRO_BASE_URL: &str = "https://api.vyro.ai";
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PEXELS_BASE_URL: &str = "https://api.pexels.com";

/// Configuration file structure for ai-hub.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Base URLs of the upstream services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub fal: String,
    pub vyro: String,
    pub openrouter: String,
    pub gemini: String,
    pub pexels: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            fal: DEFAULT_FAL_BASE_URL.to_string(),
            vyro: DEFAULT_VYRO_BASE_URL.to_string(),
            openrouter: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            gemini: DEFAULT_GEMINI_BASE_URL.to_string(),
            pexels: DEFAULT_PEXELS_BASE_URL.to_string(),
        }
    }
}

impl EndpointsConfig {
    /// Point every service at the same base URL (used against mock servers).
    pub fn all(base_url: &str) -> Self {
        Self {
            fal: base_url.to_string(),
            vyro: base_url.to_string(),
            openrouter: base_url.to_string(),
            gemini: base_url.to_string(),
            pexels: base_url.to_string(),
        }
    }
}

/// Model identifiers used at each provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub grok: String,
    pub wan_video: String,
    pub kling_style: String,
    pub script: String,
    pub chat: String,
    pub image: String,
    pub veo: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            grok: "xai/grok-imagine/text-to-video".to_string(),
            wan_video: "fal-ai/wan-video/v2.1/image-to-video".to_string(),
            kling_style: "kling-1.0-pro".to_string(),
            script: "qwen/qwen-2-7b-instruct:free".to_string(),
            chat: "gemini-3-flash-preview".to_string(),
            image: "gemini-2.5-flash-image".to_string(),
            veo: "veo-3.1-fast-generate-preview".to_string(),
        }
    }
}

/// Poll interval and budget for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl PollSettings {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(self.interval_ms), self.max_attempts)
    }
}

/// Per-provider polling budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub fal: PollSettings,
    pub kling: PollSettings,
    pub imagine_art: PollSettings,
    pub veo: PollSettings,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fal: PollSettings {
                interval_ms: 5_000,
                max_attempts: 100,
            },
            kling: PollSettings {
                interval_ms: 5_000,
                max_attempts: 100,
            },
            imagine_art: PollSettings {
                interval_ms: 5_000,
                max_attempts: 60,
            },
            veo: PollSettings {
                interval_ms: 10_000,
                max_attempts: 60,
            },
        }
    }
}

/// Local paths for keys and downloaded media.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn keys_file(&self) -> PathBuf {
        self.keys_file
            .clone()
            .unwrap_or_else(|| config_dir().join("keys.toml"))
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.blob_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("ai-hub")
                .join("videos")
        })
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            log::debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Render this configuration as TOML, e.g. for `config init`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    SerializeError(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::SerializeError(source) => {
                write!(f, "Failed to render config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::SerializeError(source) => Some(source),
        }
    }
}

/// Directory holding ai-hub's config and key files.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        })
        .join("ai-hub")
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    config_dir().join("config.toml")
}
