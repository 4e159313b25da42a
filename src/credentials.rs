//! Per-service API keys with built-in defaults and persisted overrides.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Upstream service that needs its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    Fal,
    Kling,
    ImagineArt,
    Openrouter,
    Gemini,
    Pexels,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Fal,
        Service::Kling,
        Service::ImagineArt,
        Service::Openrouter,
        Service::Gemini,
        Service::Pexels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Fal => "fal",
            Service::Kling => "kling",
            Service::ImagineArt => "imagine-art",
            Service::Openrouter => "openrouter",
            Service::Gemini => "gemini",
            Service::Pexels => "pexels",
        }
    }

    /// Environment variable holding the built-in default key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Service::Fal => "FAL_API_KEY",
            Service::Kling => "KLING_API_KEY",
            Service::ImagineArt => "IMAGINE_ART_API_KEY",
            Service::Openrouter => "OPENROUTER_API_KEY",
            Service::Gemini => "GEMINI_API_KEY",
            Service::Pexels => "PEXELS_API_KEY",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .iter()
            .copied()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| format!("Unknown service '{}'", s))
    }
}

/// Errors raised while persisting key overrides.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("Failed to access key file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse key file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write key file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Key store lock poisoned")]
    Poisoned,
}

/// Scoped key-value storage of overrides, keyed by service name.
pub trait KeyStore: Send + Sync {
    fn get(&self, service: Service) -> Option<String>;
    fn set(&self, service: Service, value: &str) -> Result<(), KeyStoreError>;
}

/// Overrides kept only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<Service, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, service: Service) -> Option<String> {
        self.keys.read().ok()?.get(&service).cloned()
    }

    fn set(&self, service: Service, value: &str) -> Result<(), KeyStoreError> {
        let mut keys = self.keys.write().map_err(|_| KeyStoreError::Poisoned)?;
        keys.insert(service, value.to_string());
        Ok(())
    }
}

/// Overrides persisted as `service = "key"` lines in a TOML file.
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    keys: RwLock<BTreeMap<String, String>>,
}

impl FileKeyStore {
    /// Open the store, reading existing overrides if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
        let path = path.into();
        let keys = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| KeyStoreError::Io {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&content).map_err(|source| KeyStoreError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            keys: RwLock::new(keys),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, keys: &BTreeMap<String, String>) -> Result<(), KeyStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| KeyStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string(keys)?;
        std::fs::write(&self.path, content).map_err(|source| KeyStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, service: Service) -> Option<String> {
        self.keys.read().ok()?.get(service.as_str()).cloned()
    }

    fn set(&self, service: Service, value: &str) -> Result<(), KeyStoreError> {
        let mut keys = self.keys.write().map_err(|_| KeyStoreError::Poisoned)?;
        let mut updated = keys.clone();
        updated.insert(service.as_str().to_string(), value.to_string());
        self.persist(&updated)?;
        *keys = updated;
        log::info!("Stored {} key override in {}", service, self.path.display());
        Ok(())
    }
}

/// Resolves the key to send to each service.
#[derive(Clone)]
pub struct Credentials {
    defaults: HashMap<Service, String>,
    store: Arc<dyn KeyStore>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut configured: Vec<_> = self.defaults.keys().map(Service::as_str).collect();
        configured.sort_unstable();
        f.debug_struct("Credentials")
            .field("defaults", &configured)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn new(defaults: HashMap<Service, String>, store: Arc<dyn KeyStore>) -> Self {
        Self { defaults, store }
    }

    /// Defaults read from each service's environment variable.
    pub fn from_env(store: Arc<dyn KeyStore>) -> Self {
        let defaults = Service::ALL
            .iter()
            .filter_map(|service| {
                std::env::var(service.env_var())
                    .ok()
                    .filter(|key| !key.is_empty())
                    .map(|key| (*service, key))
            })
            .collect();
        Self::new(defaults, store)
    }

    /// Fixed keys with in-memory overrides, for tests and embedding.
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = (Service, K)>,
        K: Into<String>,
    {
        let defaults = keys.into_iter().map(|(s, k)| (s, k.into())).collect();
        Self::new(defaults, Arc::new(MemoryKeyStore::new()))
    }

    /// Override if one was set, else the default, else an empty key.
    pub fn get_key(&self, service: Service) -> String {
        if let Some(key) = self.store.get(service) {
            return key;
        }
        match self.defaults.get(&service) {
            Some(key) => key.clone(),
            None => {
                log::warn!(
                    "No {} API key configured (set {} or run `ai-hub keys set {}`)",
                    service,
                    service.env_var(),
                    service
                );
                String::new()
            }
        }
    }

    /// Persist an override used by every later call.
    pub fn set_key(&self, service: Service, value: &str) -> Result<(), KeyStoreError> {
        self.store.set(service, value)
    }

    /// Whether any key, default or override, exists for the service.
    pub fn has_key(&self, service: Service) -> bool {
        self.store.get(service).is_some() || self.defaults.contains_key(&service)
    }
}

/// Mask a key for display, keeping only its last four characters.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}
