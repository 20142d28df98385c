//! git::objects
//!
//! Binding wrappers for objects derived from a repository.
//!
//! Trees, commits and blobs are held as an object id plus the repository
//! they were looked up in; the native object is re-read inside the
//! execution phase that uses it. An [`Index`] likewise keeps only where
//! it comes from and what was staged on it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use super::error::GitError;
use super::repository::Repository;
use crate::core::types::Oid;
use crate::lock::{AsResource, Resource, ResourceKind};

/// Convert an engine id into the crate's [`Oid`].
pub(crate) fn oid_from_raw(raw: git2::Oid) -> Oid {
    Oid::from_engine_hex(raw.to_string())
}

/// Convert a validated [`Oid`] back into an engine id.
pub(crate) fn raw_from_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|_| GitError::InvalidOid {
        oid: oid.to_string(),
    })
}

/// A tree looked up in a repository.
#[derive(Debug, Clone)]
pub struct Tree {
    repository: Repository,
    id: git2::Oid,
    resource: Resource,
}

impl Tree {
    pub(crate) fn new(repository: &Repository, id: git2::Oid) -> Self {
        Self {
            repository: repository.clone(),
            id,
            resource: Resource::owned_by(ResourceKind::Tree, repository.resource()),
        }
    }

    pub fn id(&self) -> Oid {
        oid_from_raw(self.id)
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub(crate) fn raw_id(&self) -> git2::Oid {
        self.id
    }
}

impl AsResource for Tree {
    fn resource(&self) -> &Resource {
        &self.resource
    }
}

/// A commit looked up in a repository.
#[derive(Debug, Clone)]
pub struct Commit {
    repository: Repository,
    id: git2::Oid,
    resource: Resource,
}

impl Commit {
    pub(crate) fn new(repository: &Repository, id: git2::Oid) -> Self {
        Self {
            repository: repository.clone(),
            id,
            resource: Resource::owned_by(ResourceKind::Commit, repository.resource()),
        }
    }

    pub fn id(&self) -> Oid {
        oid_from_raw(self.id)
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// The commit's root tree.
    pub fn tree(&self) -> Result<Tree, GitError> {
        let tree_id = self.repository.with_raw(|repo| {
            repo.find_commit(self.id)
                .map(|commit| commit.tree_id())
                .map_err(|e| GitError::from_git2(e, &self.id.to_string()))
        })?;
        Ok(Tree::new(&self.repository, tree_id))
    }

    /// Summary fields of the commit.
    pub fn info(&self) -> Result<CommitInfo, GitError> {
        self.repository.with_raw(|repo| {
            repo.find_commit(self.id)
                .map(|commit| CommitInfo::from_raw(&commit))
                .map_err(|e| GitError::from_git2(e, &self.id.to_string()))
        })
    }
}

impl AsResource for Commit {
    fn resource(&self) -> &Resource {
        &self.resource
    }
}

/// A blob looked up in a repository.
#[derive(Debug, Clone)]
pub struct Blob {
    repository: Repository,
    id: git2::Oid,
    resource: Resource,
}

impl Blob {
    pub(crate) fn new(repository: &Repository, id: git2::Oid) -> Self {
        Self {
            repository: repository.clone(),
            id,
            resource: Resource::owned_by(ResourceKind::Blob, repository.resource()),
        }
    }

    pub fn id(&self) -> Oid {
        oid_from_raw(self.id)
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub(crate) fn raw_id(&self) -> git2::Oid {
        self.id
    }
}

impl AsResource for Blob {
    fn resource(&self) -> &Resource {
        &self.resource
    }
}

/// An entry staged through [`Index::add_entry`].
#[derive(Debug, Clone)]
struct StagedEntry {
    path: String,
    id: git2::Oid,
    mode: u32,
}

impl StagedEntry {
    fn to_raw(&self) -> git2::IndexEntry {
        git2::IndexEntry {
            ctime: git2::IndexTime::new(0, 0),
            mtime: git2::IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: self.mode,
            uid: 0,
            gid: 0,
            file_size: 0,
            id: self.id,
            flags: 0,
            flags_extended: 0,
            path: self.path.as_bytes().to_vec(),
        }
    }
}

/// Where the native index is rebuilt from.
#[derive(Debug)]
enum IndexBase {
    Repository(Repository),
    File(PathBuf),
    Empty,
}

#[derive(Debug)]
struct IndexInner {
    resource: Resource,
    base: IndexBase,
    staged: Mutex<Vec<StagedEntry>>,
}

/// A staging index.
///
/// Owned by its repository when obtained through [`Repository::index`];
/// detached (its own lock key) when created in memory or opened from a
/// file. Native index handles cannot leave the thread that made them, so
/// the wrapper keeps its source plus any staged entries and rebuilds the
/// handle inside each execution phase.
#[derive(Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("resource", &self.inner.resource.id())
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl Index {
    pub(crate) fn owned(repository: &Repository) -> Self {
        Self::with_base(
            Resource::owned_by(ResourceKind::Index, repository.resource()),
            IndexBase::Repository(repository.clone()),
        )
    }

    fn with_base(resource: Resource, base: IndexBase) -> Self {
        Self {
            inner: Arc::new(IndexInner {
                resource,
                base,
                staged: Mutex::new(Vec::new()),
            }),
        }
    }

    /// An empty in-memory index not backed by any repository.
    pub fn in_memory() -> Self {
        Self::with_base(Resource::root(ResourceKind::Index), IndexBase::Empty)
    }

    /// Open an index file without its repository.
    ///
    /// # Errors
    ///
    /// [`GitError::Engine`] if the file is not a readable index.
    pub fn open_file(path: &Path) -> Result<Self, GitError> {
        git2::Index::open(path)
            .map_err(|e| GitError::from_git2(e, &path.display().to_string()))?;
        Ok(Self::with_base(
            Resource::root(ResourceKind::Index),
            IndexBase::File(path.to_path_buf()),
        ))
    }

    pub fn repository(&self) -> Option<&Repository> {
        match &self.inner.base {
            IndexBase::Repository(repository) => Some(repository),
            IndexBase::File(_) | IndexBase::Empty => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        self.repository().is_none()
    }

    /// Stage a blob entry in memory; it shows up in every later read of
    /// this index.
    ///
    /// # Errors
    ///
    /// [`GitError::Engine`] if the engine rejects the entry.
    pub fn add_entry(&self, path: &str, id: &Oid, mode: u32) -> Result<(), GitError> {
        let entry = StagedEntry {
            path: path.to_string(),
            id: raw_from_oid(id)?,
            mode,
        };
        let mut scratch =
            git2::Index::new().map_err(|e| GitError::from_git2(e, "in-memory index"))?;
        scratch
            .add(&entry.to_raw())
            .map_err(|e| GitError::from_git2(e, path))?;

        let mut staged = self.inner.staged.lock().unwrap_or_else(PoisonError::into_inner);
        staged.retain(|existing| existing.path != entry.path);
        staged.push(entry);
        Ok(())
    }

    /// Build the native index and run `f` on it.
    ///
    /// Call from an execution phase that holds this index's lock key.
    pub(crate) fn with_raw<R>(
        &self,
        f: impl FnOnce(&mut git2::Index) -> R,
    ) -> Result<R, git2::Error> {
        let staged = self
            .inner
            .staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let build = |mut raw: git2::Index| -> Result<R, git2::Error> {
            for entry in &staged {
                raw.add(&entry.to_raw())?;
            }
            Ok(f(&mut raw))
        };

        match &self.inner.base {
            IndexBase::Repository(repository) => {
                repository.with_raw(|repo| repo.index().and_then(build))
            }
            IndexBase::File(path) => git2::Index::open(path).and_then(build),
            IndexBase::Empty => git2::Index::new().and_then(build),
        }
    }
}

impl AsResource for Index {
    fn resource(&self) -> &Resource {
        &self.inner.resource
    }
}

/// Information about a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp
    pub author_time: DateTime<Utc>,
}

impl CommitInfo {
    pub(crate) fn from_raw(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let author_time = Utc
            .timestamp_opt(author.when().seconds(), 0)
            .single()
            .unwrap_or_default();
        Self {
            oid: oid_from_raw(commit.id()),
            summary: commit.summary().unwrap_or_default().to_string(),
            author_name: author.name().unwrap_or_default().to_string(),
            author_email: author.email().unwrap_or_default().to_string(),
            author_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_index_is_its_own_root() {
        let index = Index::in_memory();
        assert!(index.is_detached());
        assert!(index.resource().owner().is_none());
        assert_eq!(
            index.resource().lock_key().map(|k| k.resource_id()),
            Some(index.resource().id())
        );
    }

    #[test]
    fn two_detached_indexes_never_share_a_key() {
        let a = Index::in_memory();
        let b = Index::in_memory();
        assert_ne!(a.resource().lock_key(), b.resource().lock_key());
    }

    #[test]
    fn add_entry_to_detached_index() {
        let index = Index::in_memory();
        let id = Oid::new("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
        index.add_entry("docs/readme.md", &id, 0o100644).unwrap();
        index.add_entry("docs/readme.md", &id, 0o100755).unwrap();
        assert_eq!(index.with_raw(|raw| raw.len()).unwrap(), 1);
        let mode = index
            .with_raw(|raw| raw.get_path(Path::new("docs/readme.md"), 0).map(|e| e.mode))
            .unwrap();
        assert_eq!(mode, Some(0o100755));
    }

    #[test]
    fn rejected_entry_is_not_staged() {
        let index = Index::in_memory();
        let id = Oid::new("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
        assert!(index.add_entry("bad-mode.txt", &id, 0o123).is_err());
        assert_eq!(index.with_raw(|raw| raw.len()).unwrap(), 0);
    }

    #[test]
    fn open_file_reads_index_without_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index");
        let id = Oid::new("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
        let mut raw = git2::Index::open(&path).unwrap();
        raw.add(&StagedEntry {
            path: "kept.txt".into(),
            id: raw_from_oid(&id).unwrap(),
            mode: 0o100644,
        }
        .to_raw())
        .unwrap();
        raw.write().unwrap();

        let index = Index::open_file(&path).unwrap();
        assert!(index.is_detached());
        assert!(index.resource().owner().is_none());
        assert_eq!(index.with_raw(|raw| raw.len()).unwrap(), 1);
    }

    #[test]
    fn open_file_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index");
        std::fs::write(&path, b"not an index").unwrap();
        assert!(Index::open_file(&path).is_err());
    }

    #[test]
    fn commit_info_and_tree_of_looked_up_commit() {
        let fixture = crate::ops::test_support::TestRepo::new();
        let head = fixture.commit_file("a.txt", "a\n", "first line\n\nbody");
        let repo = fixture.open();

        let commit = repo.find_commit("HEAD").unwrap();
        let info = commit.info().unwrap();
        assert_eq!(info.oid.as_str(), head);
        assert_eq!(info.summary, "first line");
        assert_eq!(commit.tree().unwrap().id().as_str(), fixture.git(&["rev-parse", "HEAD^{tree}"]));
    }

    #[test]
    fn wrappers_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Repository>();
        assert_send_sync::<Tree>();
        assert_send_sync::<Commit>();
        assert_send_sync::<Blob>();
        assert_send_sync::<Index>();
    }

    #[test]
    fn oid_conversion_roundtrip() {
        let oid = Oid::new("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
        let raw = raw_from_oid(&oid).unwrap();
        assert_eq!(oid_from_raw(raw), oid);
    }
}
