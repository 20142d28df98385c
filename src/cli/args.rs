//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output
//! - `--workers <n>`: Worker pool size (overrides config)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lw - run git object queries on a lock-coordinated worker pool
#[derive(Parser, Debug)]
#[command(name = "lw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if lw was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging (task and lock traces)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Number of worker threads
    #[arg(long, global = true, value_name = "N")]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List references, or look up the given names
    #[command(
        name = "refs",
        after_help = "\
EXAMPLES:
    # Every reference, symbolic ones resolved
    lw refs

    # Look up names the way git does (main, origin/main, v1.0, ...)
    lw refs main v1.0 does-not-exist"
    )]
    Refs {
        /// Names to look up instead of listing everything
        names: Vec<String>,
    },

    /// List configured remotes
    Remotes,

    /// List submodules
    Submodules,

    /// List every file path in a tree
    Paths {
        /// Revision whose tree to list
        #[arg(default_value = "HEAD")]
        rev: String,
    },

    /// Line-level diff between two blobs
    #[command(
        name = "diff-blobs",
        after_help = "\
EXAMPLES:
    lw diff-blobs HEAD~1:src/lib.rs HEAD:src/lib.rs
    lw diff-blobs --context 0 -w 3b18e51 9f2c0a4"
    )]
    DiffBlobs {
        /// Old blob (revision expression or blob id)
        old: String,

        /// New blob (revision expression or blob id)
        new: String,

        /// Context lines around each change
        #[arg(long, default_value_t = 3)]
        context: u32,

        /// Ignore whitespace when comparing lines
        #[arg(short = 'w', long)]
        ignore_whitespace: bool,
    },

    /// History of a single path
    History {
        /// Path relative to the repository root
        path: String,

        /// Commit to start from
        #[arg(long, default_value = "HEAD")]
        rev: String,

        /// Continue an earlier walk from the commits it left unvisited
        #[arg(long = "from", value_name = "OID", num_args = 1.., conflicts_with = "rev")]
        from: Vec<String>,

        /// Maximum number of commits to visit
        #[arg(short = 'n', long, default_value_t = 50)]
        max_count: usize,
    },

    /// List index entries
    Index,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lw", "paths", "--json", "--workers", "2"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.workers, Some(2));
        assert!(matches!(cli.command, Command::Paths { ref rev } if rev == "HEAD"));
    }

    #[test]
    fn history_defaults() {
        let cli = Cli::try_parse_from(["lw", "history", "src/lib.rs"]).unwrap();
        match cli.command {
            Command::History {
                path,
                rev,
                from,
                max_count,
            } => {
                assert_eq!(path, "src/lib.rs");
                assert_eq!(rev, "HEAD");
                assert!(from.is_empty());
                assert_eq!(max_count, 50);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
