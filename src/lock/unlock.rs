//! lock::unlock
//!
//! Thread-local release and restore of the active lock master.
//!
//! An execution phase that holds a repository's key may need to run logic
//! that locks the same key again on the same thread (a callback into code
//! that submits or runs a synchronous locking operation). A
//! [`TemporaryUnlock`] releases the thread's active keys for its lifetime
//! and relocks them, in the same ascending order, when dropped. Other
//! threads may take the keys in between; that is the point.
//!
//! This is a save/restore on the current thread only. The type is `!Send`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::master::ActiveLocks;

thread_local! {
    static ACTIVE: RefCell<Option<Weak<ActiveLocks>>> = const { RefCell::new(None) };
}

/// Make `active` the thread's active master, returning the one it replaces.
pub(crate) fn register(active: &Rc<ActiveLocks>) -> Option<Weak<ActiveLocks>> {
    ACTIVE.with(|slot| slot.borrow_mut().replace(Rc::downgrade(active)))
}

/// Restore `previous` if `active` is still the registered master.
pub(crate) fn unregister(active: &Rc<ActiveLocks>, previous: Option<Weak<ActiveLocks>>) {
    ACTIVE.with(|slot| {
        let mut slot = slot.borrow_mut();
        let is_current = slot
            .as_ref()
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Rc::as_ptr(active)));
        if is_current {
            *slot = previous;
        }
    });
}

fn current() -> Option<Rc<ActiveLocks>> {
    ACTIVE.with(|slot| slot.borrow().as_ref().and_then(Weak::upgrade))
}

/// Whether the current thread has a lock master holding its keys.
pub fn thread_holds_locks() -> bool {
    current().is_some_and(|active| active.is_locked())
}

/// Releases the current thread's active keys until dropped.
///
/// # Example
///
/// ```
/// use latchwork::lock::{
///     thread_holds_locks, LockMaster, LockRegistry, Resource, ResourceKind, ResourceSet,
///     TemporaryUnlock, ThreadSafety,
/// };
///
/// let context = LockRegistry::initialize_global(ThreadSafety::Enabled).initialize_context();
/// let repo = Resource::root(ResourceKind::Repository);
/// let _master = LockMaster::acquire(&context, true, &ResourceSet::new().with(&repo));
///
/// {
///     let unlock = TemporaryUnlock::acquire();
///     assert!(unlock.is_suspending());
///     assert!(!thread_holds_locks());
///     // Re-entrant locking of the same repository works here.
///     let _again = LockMaster::acquire(&context, true, &ResourceSet::new().with(&repo));
/// }
/// assert!(thread_holds_locks());
/// ```
#[derive(Debug)]
#[must_use = "keys are relocked as soon as the TemporaryUnlock is dropped"]
pub struct TemporaryUnlock {
    suspended: Option<Rc<ActiveLocks>>,
}

impl TemporaryUnlock {
    /// Release the active master's keys, if any are held.
    pub fn acquire() -> Self {
        match current() {
            Some(active) if active.is_locked() => {
                active.unlock_all();
                tracing::trace!("temporarily unlocked");
                Self {
                    suspended: Some(active),
                }
            }
            _ => Self { suspended: None },
        }
    }

    /// Whether this guard released anything.
    pub fn is_suspending(&self) -> bool {
        self.suspended.is_some()
    }
}

impl Drop for TemporaryUnlock {
    fn drop(&mut self) {
        if let Some(active) = self.suspended.take() {
            active.lock_all();
            tracing::trace!("relocked after temporary unlock");
        }
    }
}
