//! Configuration for the watched-file registry.
//!
//! Layered configuration:
//! - Default values
//! - TOML configuration file (`.tailwatch/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TAILWATCH_` and use double
//! underscores to separate nested levels:
//! - `TAILWATCH_WATCH__FILE_SORT_BY=path` sets `watch.file_sort_by`
//! - `TAILWATCH_WATCH__FILE_SORT_DIRECTION=desc` sets `watch.file_sort_direction`
//! - `TAILWATCH_LOGGING__DEFAULT=debug` sets `logging.default`
//!
//! Unknown sort values fail extraction, so no registry is ever built from
//! an invalid policy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::watcher::{OrderingPolicy, SortBy, SortDirection};

const CONFIG_DIR: &str = ".tailwatch";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "TAILWATCH_";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// Registry ordering
    #[serde(default)]
    pub watch: WatchConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchConfig {
    /// Primary sort key: `path` or `last_modified`
    #[serde(default)]
    pub file_sort_by: SortBy,

    /// `asc` or `desc`
    #[serde(default)]
    pub file_sort_direction: SortDirection,
}

impl WatchConfig {
    pub fn policy(&self) -> OrderingPolicy {
        OrderingPolicy::new(self.file_sort_by, self.file_sort_direction)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all targets
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::figment(Toml::file(config_path))
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file, still honouring env overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path.as_ref()))
            .extract()
            .map_err(Box::new)
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(file)
            // Double underscore separates nesting levels, single underscores stay in field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Find `.tailwatch/settings.toml` from the current directory upwards.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}
