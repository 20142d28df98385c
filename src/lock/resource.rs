//! lock::resource
//!
//! Resource identities and lock key resolution.
//!
//! # Overview
//!
//! Every native object handed to an operation is described by a
//! [`Resource`]: a process-unique id, a [`ResourceKind`], and an optional
//! owner. The engine is only thread-safe per ownership root, so the lock
//! that protects an object is the lock of the root of its ownership chain.
//!
//! # Resolution Rules
//!
//! | Rule                    | Kinds                                   | Key                         |
//! |-------------------------|-----------------------------------------|-----------------------------|
//! | [`LockRule::Root`]      | repository                              | itself                      |
//! | [`LockRule::Owned`]     | index, tree, commit, blob, remote, ...  | ownership root, else itself |
//! | [`LockRule::Unlocked`]  | oid, signature, buffer, options         | none                        |
//!
//! The table is a closed `match` with no wildcard arm. Adding a kind forces
//! a decision about how it locks; under-locking is a data race, not a style
//! choice.
//!
//! # Example
//!
//! ```
//! use latchwork::lock::{Resource, ResourceKind, resolve_lock_key};
//!
//! let repo = Resource::root(ResourceKind::Repository);
//! let tree = Resource::owned_by(ResourceKind::Tree, &repo);
//! assert_eq!(resolve_lock_key(&tree), resolve_lock_key(&repo));
//!
//! let oid = Resource::root(ResourceKind::Oid);
//! assert!(resolve_lock_key(&oid).is_none());
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a native object.
///
/// Ids are allocated monotonically and never reused, which gives every
/// pair of resources a stable total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kinds of native objects the engine hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Repository,
    Index,
    Tree,
    Commit,
    Blob,
    Reference,
    Remote,
    Submodule,
    Revwalk,
    Odb,
    Config,
    Diff,
    Oid,
    Signature,
    Buffer,
    Options,
}

/// How a kind of resource participates in locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRule {
    /// The resource is an ownership root and locks on itself.
    Root,
    /// The resource locks on its ownership root, or on itself if detached.
    Owned,
    /// Plain value types the engine never mutates behind our back.
    Unlocked,
}

impl ResourceKind {
    /// The locking rule for this kind.
    pub fn lock_rule(self) -> LockRule {
        match self {
            ResourceKind::Repository => LockRule::Root,
            ResourceKind::Index
            | ResourceKind::Tree
            | ResourceKind::Commit
            | ResourceKind::Blob
            | ResourceKind::Reference
            | ResourceKind::Remote
            | ResourceKind::Submodule
            | ResourceKind::Revwalk
            | ResourceKind::Odb
            | ResourceKind::Config
            | ResourceKind::Diff => LockRule::Owned,
            ResourceKind::Oid
            | ResourceKind::Signature
            | ResourceKind::Buffer
            | ResourceKind::Options => LockRule::Unlocked,
        }
    }

    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Repository => "repository",
            ResourceKind::Index => "index",
            ResourceKind::Tree => "tree",
            ResourceKind::Commit => "commit",
            ResourceKind::Blob => "blob",
            ResourceKind::Reference => "reference",
            ResourceKind::Remote => "remote",
            ResourceKind::Submodule => "submodule",
            ResourceKind::Revwalk => "revwalk",
            ResourceKind::Odb => "odb",
            ResourceKind::Config => "config",
            ResourceKind::Diff => "diff",
            ResourceKind::Oid => "oid",
            ResourceKind::Signature => "signature",
            ResourceKind::Buffer => "buffer",
            ResourceKind::Options => "options",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct ResourceNode {
    id: ResourceId,
    kind: ResourceKind,
    owner: Option<Resource>,
}

/// Identity of a native object, with its ownership relation.
///
/// Cloning is cheap and yields the same identity.
#[derive(Debug, Clone)]
pub struct Resource(Arc<ResourceNode>);

impl Resource {
    /// A resource with no owner.
    ///
    /// Used for repositories and for detached objects such as an index
    /// that is not backed by a repository.
    pub fn root(kind: ResourceKind) -> Self {
        Self(Arc::new(ResourceNode {
            id: ResourceId::next(),
            kind,
            owner: None,
        }))
    }

    /// A resource owned by `owner`.
    ///
    /// Root kinds never have owners; asking for one yields an ownerless
    /// resource.
    pub fn owned_by(kind: ResourceKind, owner: &Resource) -> Self {
        if kind.lock_rule() == LockRule::Root {
            tracing::warn!(%kind, owner = %owner.id(), "root resource cannot be owned; ignoring owner");
            return Self::root(kind);
        }

        Self(Arc::new(ResourceNode {
            id: ResourceId::next(),
            kind,
            owner: Some(owner.clone()),
        }))
    }

    pub fn id(&self) -> ResourceId {
        self.0.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.0.kind
    }

    pub fn owner(&self) -> Option<&Resource> {
        self.0.owner.as_ref()
    }

    /// Follow the owner chain to its end.
    pub fn ownership_root(&self) -> &Resource {
        let mut current = self;
        while let Some(owner) = current.owner() {
            current = owner;
        }
        current
    }

    /// The lock key protecting this resource, if it needs one.
    pub fn lock_key(&self) -> Option<LockKey> {
        resolve_lock_key(self)
    }

    /// Whether two handles name the same native object.
    pub fn same_as(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Canonical serialization identity of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockKey(ResourceId);

impl LockKey {
    pub fn resource_id(self) -> ResourceId {
        self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key{}", self.0)
    }
}

/// Resolve the key that must be held to use `resource` safely.
///
/// Returns `None` only for kinds on the [`LockRule::Unlocked`] allow-list.
pub fn resolve_lock_key(resource: &Resource) -> Option<LockKey> {
    match resource.kind().lock_rule() {
        LockRule::Root => Some(LockKey(resource.id())),
        LockRule::Owned => Some(LockKey(resource.ownership_root().id())),
        LockRule::Unlocked => None,
    }
}

/// Anything that carries a [`Resource`] identity.
///
/// Binding wrappers implement this so operations can declare them
/// directly.
pub trait AsResource {
    fn resource(&self) -> &Resource;
}

impl AsResource for Resource {
    fn resource(&self) -> &Resource {
        self
    }
}

impl<T: AsResource + ?Sized> AsResource for &T {
    fn resource(&self) -> &Resource {
        (**self).resource()
    }
}

/// The resources an operation declares it will touch.
///
/// Order and duplicates in the declaration do not matter: [`lock_keys`]
/// is canonical.
///
/// [`lock_keys`]: ResourceSet::lock_keys
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    resources: Vec<Resource>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource.
    pub fn with(mut self, resource: &impl AsResource) -> Self {
        self.push(resource);
        self
    }

    pub fn push(&mut self, resource: &impl AsResource) {
        self.resources.push(resource.resource().clone());
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Resolved keys, deduplicated, in ascending order.
    pub fn lock_keys(&self) -> Vec<LockKey> {
        self.resources
            .iter()
            .filter_map(resolve_lock_key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl<'a> FromIterator<&'a Resource> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = &'a Resource>>(iter: I) -> Self {
        Self {
            resources: iter.into_iter().cloned().collect(),
        }
    }
}

/// Build a [`ResourceSet`] from optional resources; `None` entries are
/// ignored.
///
/// # Example
///
/// ```
/// use latchwork::lock::{declare_resources, Resource, ResourceKind};
///
/// let repo = Resource::root(ResourceKind::Repository);
/// let set = declare_resources([Some(&repo), None]);
/// assert_eq!(set.len(), 1);
/// ```
pub fn declare_resources<'a, I>(resources: I) -> ResourceSet
where
    I: IntoIterator<Item = Option<&'a Resource>>,
{
    resources.into_iter().flatten().collect()
}
