//! # nameguard-config
//!
//! Configuration for the `nameguard` launcher.
//!
//! The shim itself reads no configuration; everything here is about finding
//! the shared object and activating it for a child process.
//!
//! Loads configuration from:
//! 1. `~/.nameguard/config.toml` (global)
//! 2. `.nameguard/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

pub mod logging;
pub mod path;
pub mod testing;

pub use logging::LogLevel;

/// File name of the shim produced by `cargo build -p nameguard-shim`.
pub const LIBRARY_FILE_NAME: &str = "libnameguard_shim.so";

/// Overrides `shim.library`.
pub const ENV_LIBRARY: &str = "NAMEGUARD_LIB";
/// Overrides `log.level`.
pub const ENV_LOG_LEVEL: &str = "NAMEGUARD_LOG_LEVEL";
/// Full `tracing` filter directive, takes precedence over any level.
pub const ENV_LOG_FILTER: &str = "NAMEGUARD_LOG";
/// Set in the environment of every process launched with the shim.
pub const ENV_ACTIVE: &str = "NAMEGUARD_ACTIVE";

const PRELOAD_VAR: &str = "LD_PRELOAD";

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shim: ShimConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        Self::load_from(
            global.as_deref(),
            Path::new(".nameguard/config.toml"),
            |k| std::env::var(k).ok(),
        )
    }

    /// Load from explicit file locations with a custom environment lookup.
    ///
    /// Missing files are skipped. Tables from the project file are merged
    /// key by key over the global file, so a project can override one field
    /// without restating the rest.
    pub fn load_from(
        global_path: Option<&Path>,
        project_path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut table = toml::Table::new();

        // 1. Global config
        if let Some(global_path) = global_path {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(global_path)?;
                table = toml::from_str(&contents)?;
            }
        }

        // 2. Project config - overrides global
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            let contents = std::fs::read_to_string(project_path)?;
            merge_tables(&mut table, toml::from_str(&contents)?);
        }

        let mut config: Config = toml::Value::Table(table).try_into()?;

        // 3. Environment variable overrides
        config.apply_env_overrides(env)?;

        Ok(config)
    }

    /// Global config path: ~/.nameguard/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".nameguard/config.toml"))
    }

    fn apply_env_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = env(ENV_LIBRARY).filter(|p| !p.is_empty()) {
            self.shim.library = Some(PathBuf::from(path));
        }
        if let Some(level) = env(ENV_LOG_LEVEL) {
            self.log.level = level.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_LOG_LEVEL,
                value: level,
            })?;
        }
        Ok(())
    }

    /// Environment that activates the shim in a child process.
    ///
    /// The shim is put first in `LD_PRELOAD` so it wins over any other
    /// preloaded `prctl`. Entries from `inherited` are kept after it, minus
    /// any other copy of the shim, whatever path it was given by.
    pub fn preload_env(library: &Path, inherited: Option<&str>) -> Vec<(String, String)> {
        let lib = library.to_string_lossy();
        let mut entries = vec![lib.as_ref()];
        if let Some(inherited) = inherited {
            // ld.so accepts both ':' and ' ' as separators
            entries.extend(
                inherited
                    .split([':', ' '])
                    .filter(|e| !e.is_empty())
                    .filter(|e| Path::new(e).file_name() != Some(OsStr::new(LIBRARY_FILE_NAME))),
            );
        }
        vec![
            (PRELOAD_VAR.to_string(), entries.join(":")),
            (ENV_ACTIVE.to_string(), "1".to_string()),
        ]
    }
}

/// Recursively overlay `overlay` onto `base`. Non-table values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(dst)), toml::Value::Table(src)) => merge_tables(dst, src),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Where the launcher finds the shim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Explicit path to `libnameguard_shim.so` (None = search)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<PathBuf>,
}

/// Launcher logging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}
