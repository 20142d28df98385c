//! core::config::schema
//!
//! Configuration schema types.
//!
//! Both scopes (global and repo) share one schema; a repo file overrides
//! the global file key by key.
//!
//! # Validation
//!
//! Values are validated after parsing. Out-of-range pool sizes above the
//! hard cap are clamped with a warning; everything else invalid is an
//! error.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigWarning};
use crate::engine::MAX_WORKER_THREADS;
use crate::lock::ThreadSafety;

/// Log levels accepted by `log_level`.
pub const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// A configuration file.
///
/// # Example
///
/// ```toml
/// log_level = "warn"
///
/// [scheduler]
/// worker_threads = 4
///
/// [locking]
/// thread_safety = "enabled"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: Option<String>,

    /// Worker pool settings
    pub scheduler: Option<SchedulerSection>,

    /// Lock coordination settings
    pub locking: Option<LockingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSection {
    /// Number of worker threads running execution phases
    pub worker_threads: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LockingSection {
    /// `"enabled"` (default) or `"disabled"`
    pub thread_safety: Option<ThreadSafety>,
}

impl ConfigFile {
    pub fn worker_threads(&self) -> Option<usize> {
        self.scheduler.as_ref().and_then(|s| s.worker_threads)
    }

    pub fn thread_safety(&self) -> Option<ThreadSafety> {
        self.locking.as_ref().and_then(|l| l.thread_safety)
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self, path: &Path) -> Result<Vec<ConfigWarning>, ConfigError> {
        let mut warnings = Vec::new();

        if let Some(level) = &self.log_level {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid log_level '{}', must be one of: {}",
                    level,
                    LOG_LEVELS.join(", ")
                )));
            }
        }

        match self.worker_threads() {
            Some(0) => {
                return Err(ConfigError::InvalidValue(
                    "scheduler.worker_threads must be at least 1".into(),
                ))
            }
            Some(n) if n > MAX_WORKER_THREADS => warnings.push(ConfigWarning {
                message: format!(
                    "scheduler.worker_threads = {} exceeds the maximum; using {}",
                    n, MAX_WORKER_THREADS
                ),
                path: path.to_path_buf(),
            }),
            _ => {}
        }

        Ok(warnings)
    }
}
