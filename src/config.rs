use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target recall probability at review time, 0.0-1.0 (default: 0.9)
    #[serde(default = "default_retention")]
    pub retention: f64,

    /// Maximum new cards introduced per study session (default: 10)
    #[serde(default = "default_new_limit")]
    pub new_limit: usize,

    /// User the global model weights are stored under (default: "default")
    #[serde(default = "default_user")]
    pub user: String,

    /// Path to decks directory
    #[serde(default = "default_decks_dir")]
    pub decks_dir: PathBuf,

    /// Path to database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_retention() -> f64 {
    0.9
}

fn default_new_limit() -> usize {
    10
}

fn default_user() -> String {
    "default".to_string()
}

fn default_decks_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("cram").join("decks"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("cram").join("cram.db"))
        .unwrap_or_else(|| PathBuf::from("cram.db"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            new_limit: default_new_limit(),
            user: default_user(),
            decks_dir: default_decks_dir(),
            db_path: default_db_path(),
        }
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(suffix) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(suffix);
    }
    path.to_path_buf()
}

impl Config {
    /// Load config from file or return defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.decks_dir = expand_tilde(&config.decks_dir);
            config.db_path = expand_tilde(&config.db_path);
            config.retention = config.retention.clamp(0.5, 0.995);
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Path to config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("cram").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Ensure required directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.decks_dir)?;

        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(())
    }
}
