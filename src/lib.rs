//! latchwork - lock-coordinated task scheduling over git object graphs
//!
//! Repository objects (repositories, commits, trees, blobs, indexes, ...)
//! form ownership chains that end at a root. Work on them is packaged as
//! tasks whose execution phase runs on a worker pool while holding the locks
//! of every ownership root it touches, and whose completion phase runs back
//! on the host thread.
//!
//! # Architecture
//!
//! - [`lock`] - Resource identity, lock registry, lock master, temporary unlock
//! - [`engine`] - Task model, scheduler and host-thread dispatcher
//! - [`git`] - Thread-safe wrappers over libgit2 objects
//! - [`ops`] - Repository operations packaged as tasks
//! - [`core`] - Strong types and configuration
//! - [`cli`] - The `lw` command-line interface
//! - [`ui`] - Output formatting
//!
//! # Invariants
//!
//! 1. Two execution phases whose lock keys intersect never overlap
//! 2. Keys are always acquired in ascending order, so declared sets never
//!    deadlock each other
//! 3. Every submitted task completes exactly once, on the host thread
//! 4. No lock is held while a completion phase runs

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod lock;
pub mod ops;
pub mod ui;
