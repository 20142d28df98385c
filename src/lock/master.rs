//! lock::master
//!
//! Scoped acquisition of a deduplicated, canonically ordered key set.
//!
//! # Deadlock Freedom
//!
//! Keys are acquired in ascending [`LockKey`] order. Two operations that
//! declare `{A, B}` and `{B, A}` both lock `min(A, B)` first, so neither can
//! hold one key while waiting on the other's.
//!
//! # Ownership
//!
//! A `LockMaster` is not `Clone`: at most one value owns an acquisition.
//! Moving it transfers the held set; [`std::mem::take`] leaves an inert
//! master behind whose drop releases nothing. Dropping an active master
//! unlocks every key exactly once, in reverse acquisition order.
//!
//! A master is also `!Send`. It is registered as the active master of the
//! thread that built it, which is what [`TemporaryUnlock`] operates on.
//!
//! [`TemporaryUnlock`]: super::TemporaryUnlock

use std::cell::Cell;
use std::rc::{Rc, Weak};

use super::registry::{KeyLock, LockContext};
use super::resource::{LockKey, ResourceSet};
use super::unlock;

/// Keys held by one locking master, shared with the thread-local slot.
#[derive(Debug)]
pub(crate) struct ActiveLocks {
    context: LockContext,
    keys: Vec<LockKey>,
    locks: Vec<std::sync::Arc<KeyLock>>,
    locked: Cell<bool>,
}

impl ActiveLocks {
    pub(crate) fn is_locked(&self) -> bool {
        self.locked.get()
    }

    pub(crate) fn lock_all(&self) {
        for (key, lock) in self.keys.iter().zip(&self.locks) {
            lock.lock();
            tracing::trace!(context = %self.context.id(), %key, "acquired");
        }
        self.locked.set(true);
    }

    pub(crate) fn unlock_all(&self) {
        for (key, lock) in self.keys.iter().zip(&self.locks).rev() {
            lock.unlock();
            tracing::trace!(context = %self.context.id(), %key, "released");
        }
        self.locked.set(false);
    }
}

/// Holds the locks for one operation's declared resources.
///
/// # Example
///
/// ```
/// use latchwork::lock::{LockMaster, LockRegistry, Resource, ResourceKind, ResourceSet, ThreadSafety};
///
/// let context = LockRegistry::initialize_global(ThreadSafety::Enabled).initialize_context();
/// let repo = Resource::root(ResourceKind::Repository);
/// let tree = Resource::owned_by(ResourceKind::Tree, &repo);
///
/// let master = LockMaster::acquire(&context, true, &ResourceSet::new().with(&repo).with(&tree));
/// assert_eq!(master.keys().len(), 1);
/// drop(master);
/// assert_eq!(context.diagnostics().stored_keys, 0);
/// ```
#[derive(Debug, Default)]
#[must_use = "locks are released as soon as the LockMaster is dropped"]
pub struct LockMaster {
    active: Option<Rc<ActiveLocks>>,
    previous: Option<Weak<ActiveLocks>>,
}

impl LockMaster {
    /// Resolve, sort and acquire the keys for `resources`.
    ///
    /// With `requires_locking == false`, or when the context's thread safety
    /// is disabled, nothing is locked and the master is inert. That path is
    /// for synchronous calls that never leave the host thread.
    pub fn acquire(context: &LockContext, requires_locking: bool, resources: &ResourceSet) -> Self {
        if !requires_locking || !context.thread_safety().is_enabled() {
            return Self::default();
        }

        let keys = resources.lock_keys();
        if keys.is_empty() {
            return Self::default();
        }

        let locks = context.retain(&keys);
        let active = Rc::new(ActiveLocks {
            context: context.clone(),
            keys,
            locks,
            locked: Cell::new(false),
        });
        active.lock_all();
        tracing::trace!(context = %context.id(), keys = ?active.keys, "lock master acquired");

        let previous = unlock::register(&active);
        Self {
            active: Some(active),
            previous,
        }
    }

    /// Whether this master holds (or temporarily suspended) any keys.
    pub fn is_locking(&self) -> bool {
        self.active.is_some()
    }

    /// The held keys in acquisition order.
    pub fn keys(&self) -> &[LockKey] {
        self.active.as_ref().map_or(&[], |a| a.keys.as_slice())
    }
}

impl Drop for LockMaster {
    fn drop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        unlock::unregister(&active, self.previous.take());
        if active.is_locked() {
            active.unlock_all();
        }
        active.context.forget(&active.keys);
        tracing::trace!(context = %active.context.id(), keys = ?active.keys, "lock master released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{LockRegistry, Resource, ResourceKind, ThreadSafety};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn context() -> LockContext {
        LockRegistry::initialize_global(ThreadSafety::Enabled).initialize_context()
    }

    #[test]
    fn acquires_deduplicated_sorted_keys() {
        let ctx = context();
        let a = Resource::root(ResourceKind::Repository);
        let b = Resource::root(ResourceKind::Repository);
        let commit_b = Resource::owned_by(ResourceKind::Commit, &b);

        let set = ResourceSet::new().with(&commit_b).with(&b).with(&a);
        let master = LockMaster::acquire(&ctx, true, &set);

        assert!(master.is_locking());
        assert_eq!(
            master.keys(),
            &[a.lock_key().unwrap(), b.lock_key().unwrap()]
        );
        assert_eq!(ctx.diagnostics().stored_keys, 2);

        drop(master);
        assert_eq!(ctx.diagnostics().stored_keys, 0);
    }

    #[test]
    fn not_requiring_locking_is_inert() {
        let ctx = context();
        let repo = Resource::root(ResourceKind::Repository);
        let master = LockMaster::acquire(&ctx, false, &ResourceSet::new().with(&repo));

        assert!(!master.is_locking());
        assert!(master.keys().is_empty());
        assert_eq!(ctx.diagnostics().stored_keys, 0);
    }

    #[test]
    fn disabled_thread_safety_is_inert() {
        let ctx = LockRegistry::initialize_global(ThreadSafety::Disabled).initialize_context();
        let repo = Resource::root(ResourceKind::Repository);
        let master = LockMaster::acquire(&ctx, true, &ResourceSet::new().with(&repo));
        assert!(!master.is_locking());
    }

    #[test]
    fn unlocked_kinds_only_is_inert() {
        let ctx = context();
        let oid = Resource::root(ResourceKind::Oid);
        let master = LockMaster::acquire(&ctx, true, &ResourceSet::new().with(&oid));
        assert!(!master.is_locking());
    }

    #[test]
    fn moved_from_master_releases_nothing() {
        let ctx = context();
        let repo = Resource::root(ResourceKind::Repository);
        let key = repo.lock_key().unwrap();

        let mut a = LockMaster::acquire(&ctx, true, &ResourceSet::new().with(&repo));
        let b = std::mem::take(&mut a);

        drop(a);
        assert!(ctx.contains(key), "moved-from drop must not release");

        drop(b);
        assert!(!ctx.contains(key));
    }

    #[test]
    fn holds_out_other_threads_until_dropped() {
        let ctx = context();
        let repo = Resource::root(ResourceKind::Repository);
        let master = LockMaster::acquire(&ctx, true, &ResourceSet::new().with(&repo));

        let entered = Arc::new(AtomicBool::new(false));
        let handle = {
            let ctx = ctx.clone();
            let repo = repo.clone();
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                let _m = LockMaster::acquire(&ctx, true, &ResourceSet::new().with(&repo));
                entered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));

        drop(master);
        handle.join().expect("contender");
        assert!(entered.load(Ordering::SeqCst));
        assert_eq!(ctx.diagnostics().stored_keys, 0);
    }

    #[test]
    fn nested_masters_on_disjoint_keys() {
        let ctx = context();
        let a = Resource::root(ResourceKind::Repository);
        let b = Resource::root(ResourceKind::Repository);

        let outer = LockMaster::acquire(&ctx, true, &ResourceSet::new().with(&a));
        let inner = LockMaster::acquire(&ctx, true, &ResourceSet::new().with(&b));
        assert_eq!(ctx.diagnostics().stored_keys, 2);

        drop(inner);
        assert!(ctx.contains(a.lock_key().unwrap()));
        drop(outer);
        assert_eq!(ctx.diagnostics().stored_keys, 0);
    }
}
