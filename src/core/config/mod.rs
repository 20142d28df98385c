//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! latchwork has two configuration scopes:
//! - **Global**: User-level settings
//! - **Repo**: Repository-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$LATCHWORK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/latchwork/config.toml`
//! 3. `~/.latchwork/config.toml`
//!
//! # Repo Config Location
//!
//! `<git dir>/latchwork/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use latchwork::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/repo/.git"))).unwrap();
//! let config = result.config;
//!
//! println!("workers: {}", config.worker_threads());
//! println!("thread safety: {}", config.thread_safety());
//! ```

pub mod schema;

pub use schema::{ConfigFile, LockingSection, SchedulerSection};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::{SchedulerConfig, MAX_WORKER_THREADS};
use crate::lock::ThreadSafety;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: repo over global over defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: ConfigFile,
    pub repo: Option<ConfigFile>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `git_dir` is provided, also loads that repository's config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or hold
    /// invalid values. Missing config files are not an error.
    pub fn load(git_dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let (global, global_path) = match Self::find_global() {
            Some(path) => (Self::read_config(&path)?, Some(path)),
            None => (ConfigFile::default(), None),
        };
        if let Some(path) = &global_path {
            warnings.extend(global.validate(path)?);
        }

        let repo_path = git_dir
            .map(Self::repo_config_path)
            .filter(|path| path.exists());
        let repo = match &repo_path {
            Some(path) => {
                let config = Self::read_config(path)?;
                warnings.extend(config.validate(path)?);
                Some(config)
            }
            None => None,
        };

        Ok(ConfigLoadResult {
            config: Config {
                global,
                repo,
                global_path,
                repo_path,
            },
            warnings,
        })
    }

    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("LATCHWORK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("latchwork/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".latchwork/config.toml"))
            .filter(|path| path.exists())
    }

    fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Repo config path for a git directory.
    pub fn repo_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join("latchwork/config.toml")
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    fn layered<T>(&self, get: impl Fn(&ConfigFile) -> Option<T>) -> Option<T> {
        self.repo.as_ref().and_then(&get).or_else(|| get(&self.global))
    }

    /// Worker pool size, clamped to the hard cap.
    ///
    /// Defaults to available parallelism capped at 8.
    pub fn worker_threads(&self) -> usize {
        self.layered(ConfigFile::worker_threads)
            .unwrap_or_else(|| SchedulerConfig::default().worker_threads)
            .min(MAX_WORKER_THREADS)
    }

    /// Defaults to [`ThreadSafety::Enabled`].
    pub fn thread_safety(&self) -> ThreadSafety {
        self.layered(ConfigFile::thread_safety).unwrap_or_default()
    }

    /// Defaults to `"warn"`.
    pub fn log_level(&self) -> String {
        self.layered(|c| c.log_level.clone())
            .map(|level| level.to_ascii_lowercase())
            .unwrap_or_else(|| "warn".to_string())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::with_workers(self.worker_threads())
    }

    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
