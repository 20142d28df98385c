//! git
//!
//! Binding wrappers over the `git2` engine.
//!
//! # Architecture
//!
//! This module is the only place that names `git2` types in public
//! signatures. Each wrapper carries a [`Resource`](crate::lock::Resource)
//! identity:
//!
//! ```text
//! Repository (root)
//!  ├─ Index    (owned; or detached = its own root)
//!  ├─ Tree     (owned)
//!  ├─ Commit   (owned)
//!  └─ Blob     (owned)
//! ```
//!
//! Wrappers are `Send + Sync`; the native handle sits behind an internal
//! mutex. Serializing work across the whole ownership graph is the lock
//! master's job, not the wrappers'.
//!
//! # Invariants
//!
//! - Objects looked up through a repository resolve to that repository's
//!   lock key
//! - Two independently opened repositories never share a key, even for the
//!   same path

mod error;
mod objects;
mod repository;

pub use error::{EngineError, GitError};
pub use objects::{Blob, Commit, CommitInfo, Index, Tree};
pub use repository::Repository;

pub(crate) use objects::{oid_from_raw, raw_from_oid};
