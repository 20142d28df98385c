//! ops
//!
//! Repository operations, each packaged as a [`Task`](crate::engine::Task).
//!
//! # Modules
//!
//! - [`references`] - List references, or look up a list of names
//! - [`remotes`] - List configured remotes
//! - [`submodules`] - List submodules
//! - [`tree_paths`] - Collect every blob path under a tree
//! - [`blob_diff`] - Line-level diff between two blobs
//! - [`file_history`] - History of a single path
//! - [`index_paths`] - Entries of a staging index
//!
//! # Contract
//!
//! Constructors validate their inputs and return [`ValidationError`]
//! synchronously; an operation value that exists is ready to submit.
//! Constructors also declare every binding wrapper the execution phase
//! touches. The execution phase reads the engine under those locks and the
//! callback receives the result on the host thread.
//!
//! # Example
//!
//! ```ignore
//! use latchwork::ops::GetTreePaths;
//!
//! let tree = repo.find_tree("HEAD")?;
//! scheduler.submit(GetTreePaths::new(&tree, Box::new(|paths| {
//!     for path in paths.unwrap() {
//!         println!("{path}");
//!     }
//! })));
//! dispatcher.run_until_idle();
//! ```

pub mod blob_diff;
pub mod file_history;
pub mod index_paths;
pub mod references;
pub mod remotes;
pub mod submodules;
pub mod tree_paths;

pub use blob_diff::{CalculateSes, DiffPoint, DiffSettings, SesResult};
pub use file_history::{ChangeStatus, FileHistory, FileHistoryWalk, HistoryEntry};
pub use index_paths::{GetIndexPaths, IndexEntryInfo};
pub use references::{GetReferences, GetReferencesFromList, ReferenceInfo, ReferenceKind};
pub use remotes::{GetRemotes, RemoteInfo};
pub use submodules::{GetSubmodules, SubmoduleInfo};
pub use tree_paths::GetTreePaths;

use thiserror::Error;

/// Malformed operation inputs, reported before anything is queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A reference name in a lookup list is empty or blank.
    #[error("reference name at position {index} is empty")]
    EmptyReferenceName { index: usize },

    /// A blob was looked up in a different repository than the diff's.
    #[error("{which} blob does not belong to the repository being diffed")]
    ForeignBlob { which: &'static str },

    /// A history walk was asked for zero entries.
    #[error("max count must be at least 1")]
    ZeroMaxCount,

    /// A history walk was given no path.
    #[error("file path to get the history of is required")]
    EmptyPath,
}
