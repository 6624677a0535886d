//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/pixdrop/config.toml`
//! - Windows: `%APPDATA%/pixdrop/config.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pixdrop_upload::QueueConfig;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory uploaded objects are stored under. `~` expands to the
    /// home directory.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    /// Base URL records point at; object keys are appended to it.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Transfer chunk size in bytes (0 = library default).
    #[serde(default)]
    pub chunk_size: usize,

    /// File extensions the registrar accepts, without the dot.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default)]
    pub queue: QueueConfig,
}

fn default_storage_dir() -> String {
    "~/.local/share/pixdrop/uploads".into()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/media".into()
}

fn default_allowed_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            public_base_url: default_public_base_url(),
            chunk_size: 0,
            allowed_extensions: default_allowed_extensions(),
            queue: QueueConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default location, creating it with
    /// defaults if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    /// Loads configuration from `path`, creating it with defaults if not
    /// found.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Storage directory with `~` expanded.
    pub fn storage_path(&self) -> PathBuf {
        match self.storage_dir.strip_prefix("~/") {
            Some(rest) => home_dir().join(rest),
            None if self.storage_dir == "~" => home_dir(),
            None => PathBuf::from(&self.storage_dir),
        }
    }
}

fn home_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    PathBuf::from(std::env::var(var).unwrap_or_else(|_| "/tmp".into()))
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("pixdrop").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        home_dir().join(".config").join("pixdrop").join("config.toml")
    }
}
