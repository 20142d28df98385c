//! lock
//!
//! Resource-ownership lock coordination.
//!
//! # Modules
//!
//! - [`resource`] - Resource identities and lock key resolution
//! - [`registry`] - Process registry and per-context key maps
//! - [`master`] - Scoped, ordered acquisition of a key set
//! - [`unlock`] - Thread-local temporary release of the active master
//!
//! # Architecture
//!
//! The engine is thread-safe only across unrelated ownership roots. Every
//! operation declares the native objects it touches; the lock master
//! resolves them to the keys of their ownership roots, deduplicates and
//! sorts those keys, and holds them for the duration of native execution:
//!
//! ```text
//! ResourceSet ──resolve──▶ {LockKey} ──sort──▶ LockContext::retain ──▶ lock in order
//! ```
//!
//! # Example
//!
//! ```
//! use latchwork::lock::{LockMaster, LockRegistry, Resource, ResourceKind, ResourceSet, ThreadSafety};
//!
//! let registry = LockRegistry::initialize_global(ThreadSafety::Enabled);
//! let context = registry.initialize_context();
//!
//! let repo = Resource::root(ResourceKind::Repository);
//! let index = Resource::owned_by(ResourceKind::Index, &repo);
//!
//! {
//!     let _master = LockMaster::acquire(&context, true, &ResourceSet::new().with(&index));
//!     // native calls on the repository or its index happen here
//! }
//! ```

pub mod master;
pub mod registry;
pub mod resource;
pub mod unlock;

pub use master::LockMaster;
pub use registry::{ContextId, LockContext, LockDiagnostics, LockRegistry, ThreadSafety};
pub use resource::{
    declare_resources, resolve_lock_key, AsResource, LockKey, LockRule, Resource, ResourceId,
    ResourceKind, ResourceSet,
};
pub use unlock::{thread_holds_locks, TemporaryUnlock};
