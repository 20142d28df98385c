//! lock::registry
//!
//! Process-wide lock registry and per-context key maps.
//!
//! # Lifecycle
//!
//! 1. [`LockRegistry::initialize_global`] once, before any task is
//!    submitted.
//! 2. [`LockRegistry::initialize_context`] once per host execution context.
//!    Each context owns an isolated key map, so independent hosts never
//!    contend on each other's keys.
//! 3. Hand the [`LockContext`] to the scheduler and to every
//!    [`LockMaster`](super::LockMaster).
//!
//! Neither step may run concurrently with an in-flight task of the same
//! context.
//!
//! # Invariants
//!
//! - Entry mutation happens under a short-held map mutex that is distinct
//!   from the per-key locks handed out.
//! - An entry's reference count equals the number of live lock masters
//!   holding or waiting on its key.
//! - An entry is removed exactly when its count reaches zero.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::resource::LockKey;

/// Whether lock masters actually lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreadSafety {
    /// Lock masters acquire their keys.
    #[default]
    Enabled,
    /// Every lock master is inert. Only safe when a single worker thread
    /// touches the engine.
    Disabled,
}

impl ThreadSafety {
    pub fn is_enabled(self) -> bool {
        self == ThreadSafety::Enabled
    }
}

impl fmt::Display for ThreadSafety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadSafety::Enabled => f.write_str("enabled"),
            ThreadSafety::Disabled => f.write_str("disabled"),
        }
    }
}

#[derive(Debug)]
struct RegistryInner {
    thread_safety: ThreadSafety,
    next_context: AtomicU64,
}

/// Handle to the process-wide registry.
#[derive(Debug, Clone)]
pub struct LockRegistry {
    inner: Arc<RegistryInner>,
}

impl LockRegistry {
    /// Set up the registry. Call once, before any task is submitted.
    pub fn initialize_global(thread_safety: ThreadSafety) -> Self {
        tracing::debug!(%thread_safety, "lock registry initialized");
        Self {
            inner: Arc::new(RegistryInner {
                thread_safety,
                next_context: AtomicU64::new(1),
            }),
        }
    }

    /// Create the key map for one host execution context.
    pub fn initialize_context(&self) -> LockContext {
        let id = ContextId(self.inner.next_context.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(context = %id, "lock context initialized");
        LockContext {
            inner: Arc::new(ContextInner {
                id,
                thread_safety: self.inner.thread_safety,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn thread_safety(&self) -> ThreadSafety {
        self.inner.thread_safety
    }
}

/// Identity of a host execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// Snapshot of a context's lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockDiagnostics {
    pub context: ContextId,
    pub thread_safety: ThreadSafety,
    /// Entries currently referenced by a live lock master.
    pub stored_keys: usize,
}

/// Mutual exclusion for one key.
///
/// Lock and unlock happen in different call frames (and are interleaved by
/// temporary unlocks), so this is a flag plus condvar rather than a guard.
#[derive(Debug, Default)]
pub(crate) struct KeyLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl KeyLock {
    pub(crate) fn lock(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    pub(crate) fn unlock(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        *held = false;
        drop(held);
        self.released.notify_one();
    }
}

#[derive(Debug)]
struct Entry {
    lock: Arc<KeyLock>,
    refs: usize,
}

#[derive(Debug)]
struct ContextInner {
    id: ContextId,
    thread_safety: ThreadSafety,
    entries: Mutex<HashMap<LockKey, Entry>>,
}

/// Key map for one host execution context.
#[derive(Debug, Clone)]
pub struct LockContext {
    inner: Arc<ContextInner>,
}

impl LockContext {
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn thread_safety(&self) -> ThreadSafety {
        self.inner.thread_safety
    }

    /// Block until `key` is held exclusively.
    pub fn acquire(&self, key: LockKey) {
        let lock = self.retain(&[key]).remove(0);
        lock.lock();
        tracing::trace!(context = %self.id(), %key, "acquired");
    }

    /// Release a key obtained with [`acquire`](Self::acquire).
    pub fn release(&self, key: LockKey) {
        if let Some(lock) = self.existing(key) {
            lock.unlock();
            tracing::trace!(context = %self.id(), %key, "released");
        }
        self.forget(&[key]);
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: LockKey) -> bool {
        self.entries().contains_key(&key)
    }

    pub fn diagnostics(&self) -> LockDiagnostics {
        LockDiagnostics {
            context: self.id(),
            thread_safety: self.thread_safety(),
            stored_keys: self.entries().len(),
        }
    }

    /// Reference every key's entry, creating missing ones.
    ///
    /// Done in one critical section so a lock master observes a consistent
    /// set of entries.
    pub(crate) fn retain(&self, keys: &[LockKey]) -> Vec<Arc<KeyLock>> {
        let mut entries = self.entries();
        keys.iter()
            .map(|key| {
                let entry = entries.entry(*key).or_insert_with(|| Entry {
                    lock: Arc::new(KeyLock::default()),
                    refs: 0,
                });
                entry.refs += 1;
                Arc::clone(&entry.lock)
            })
            .collect()
    }

    /// Drop one reference per key, removing entries that reach zero.
    pub(crate) fn forget(&self, keys: &[LockKey]) {
        let mut entries = self.entries();
        for key in keys {
            let remove = match entries.get_mut(key) {
                Some(entry) => {
                    entry.refs = entry.refs.saturating_sub(1);
                    entry.refs == 0
                }
                None => {
                    tracing::warn!(context = %self.id(), %key, "released key with no entry");
                    false
                }
            };
            if remove {
                entries.remove(key);
            }
        }
    }

    fn existing(&self, key: LockKey) -> Option<Arc<KeyLock>> {
        self.entries().get(&key).map(|e| Arc::clone(&e.lock))
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<LockKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
