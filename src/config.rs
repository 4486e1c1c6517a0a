use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub classifier: ClassifierConfig,
    pub catalog: CatalogConfig,
    pub server: ServerConfig,
}

/// Review collection location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub reviews_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reviews_file: PathBuf::from(".cine-review/reviews.json"),
        }
    }
}

/// Sentiment model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model_file: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_file: PathBuf::from(".cine-review/model.json"),
        }
    }
}

/// Movie catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Listing served when no TMDB API key is present
    pub dummy_file: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            dummy_file: PathBuf::from("movies_dummy.json"),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 5000).into(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Load configuration from the default location (.cine-review/config.yml)
    pub fn load_default() -> Result<Self> {
        Self::load(".cine-review/config.yml")
    }
}
