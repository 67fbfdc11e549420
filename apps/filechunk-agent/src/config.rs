//! Agent configuration management.
//!
//! Configuration is stored as TOML:
//! - `$FILECHUNK_CONFIG` when set
//! - Linux: `~/.config/filechunk/agent.toml`
//! - Windows: `%APPDATA%/filechunk/agent.toml`
//!
//! The `[server]` table uses the same camelCase keys as the start request
//! (`portMin`, `chunkSize`, ...).

use std::path::{Path, PathBuf};

use filechunk_server::StartOptions;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the config file location.
const CONFIG_ENV: &str = "FILECHUNK_CONFIG";

/// Agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Options for the chunk server.
    #[serde(default)]
    pub server: StartOptions,
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
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

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold the encryption key.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("filechunk").join("agent.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("filechunk")
            .join("agent.toml")
    }
}
