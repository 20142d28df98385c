//! cli
//!
//! Command-line interface for latchwork.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and install the log subscriber
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Every command is one operation from [`crate::ops`]
//! submitted to a [`crate::engine::Scheduler`]; the CLI's own thread drives
//! the dispatcher and renders results from the completion phase.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use anyhow::{Context as _, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::core::config::Config;
use crate::engine::SchedulerConfig;
use crate::git::Repository;
use crate::ui::output::{self, Output, Verbosity};

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);

    // Opening the repository logs, so the subscriber starts at the global
    // level and picks up the repository's level once it is known.
    let global_level = Config::load(None)?.config.log_level();
    let log_filter = init_tracing(cli.debug, &global_level);

    let cwd = match &cli.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("failed to read the current directory")?,
    };
    let repository = Repository::open(&cwd)?;

    let loaded = Config::load(Some(repository.git_dir()))?;
    let config = loaded.config;
    if let Some(handle) = &log_filter {
        let level = config.log_level();
        if level != global_level {
            set_log_level(handle, &level);
        }
    }

    for warning in &loaded.warnings {
        output::warn(
            format!("{} ({})", warning.message, warning.path.display()),
            verbosity,
        );
    }

    // Flag wins over config
    let scheduler_config = cli
        .workers
        .map(SchedulerConfig::with_workers)
        .unwrap_or_else(|| config.scheduler_config());

    let mut session = commands::Session::new(
        repository,
        Output::new(verbosity, cli.json),
        config.thread_safety(),
        scheduler_config,
    )?;

    commands::dispatch(cli.command, &mut session)
}

type LogFilter = reload::Handle<EnvFilter, Registry>;

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins; otherwise `--debug`, otherwise the configured level.
/// Returns a handle for changing the level later, or `None` when the level
/// is pinned by the environment or the flag.
fn init_tracing(debug: bool, configured: &str) -> Option<LogFilter> {
    let (filter, pinned) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) if debug => (EnvFilter::new("debug"), true),
        Err(_) => (EnvFilter::new(configured), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_names(true)
                .compact(),
        )
        .try_init()
        .is_ok();

    (installed && !pinned).then_some(handle)
}

fn set_log_level(handle: &LogFilter, level: &str) {
    if let Err(err) = handle.reload(EnvFilter::new(level)) {
        tracing::warn!(%err, level, "could not apply configured log level");
    }
}
