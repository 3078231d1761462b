//! Context configuration.

use std::path::PathBuf;

use gamekit_types::account::ENV_DEV;
use serde::{Deserialize, Serialize};

/// Directory name under the platform config directory.
const APP_DIR: &str = "aws-gamekit";

/// Where settings live and which game and environment they are for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameKitConfig {
    /// Directory holding one settings folder per game.
    pub settings_root: PathBuf,
    /// Recorded in the settings file on every save.
    pub plugin_version: String,
    pub game_name: String,
    /// Short environment code, e.g. `dev`.
    pub environment: String,
}

impl Default for GameKitConfig {
    fn default() -> Self {
        Self {
            settings_root: Self::default_root(),
            plugin_version: env!("CARGO_PKG_VERSION").into(),
            game_name: String::new(),
            environment: ENV_DEV.into(),
        }
    }
}

impl GameKitConfig {
    pub fn new(
        settings_root: impl Into<PathBuf>,
        game_name: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            settings_root: settings_root.into(),
            game_name: game_name.into(),
            environment: environment.into(),
            ..Self::default()
        }
    }

    /// Platform default settings root, e.g. `~/.config/aws-gamekit`.
    pub fn default_root() -> PathBuf {
        config_base_dir().join(APP_DIR)
    }
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            return PathBuf::from(xdg);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join("Library").join("Application Support")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        PathBuf::from("/tmp")
    }
}
