//! git::repository
//!
//! The root binding wrapper.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::error::GitError;
use super::objects::{Blob, Commit, Index, Tree};
use crate::lock::{AsResource, Resource, ResourceKind};

struct RepositoryInner {
    resource: Resource,
    raw: Mutex<git2::Repository>,
    git_dir: PathBuf,
    work_dir: Option<PathBuf>,
}

/// An open repository.
///
/// Cloning yields another handle to the same repository and the same
/// [`Resource`] identity. Every object looked up through it is owned by it,
/// so operations on the repository and on its objects share one lock key.
///
/// # Example
///
/// ```ignore
/// use latchwork::git::Repository;
/// use std::path::Path;
///
/// let repo = Repository::open(Path::new("."))?;
/// let tree = repo.find_tree("HEAD")?;
/// ```
#[derive(Clone)]
pub struct Repository {
    inner: Arc<RepositoryInner>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("resource", &self.inner.resource.id())
            .field("git_dir", &self.inner.git_dir)
            .finish()
    }
}

impl Repository {
    /// Open the repository containing `path`.
    ///
    /// `path` can be any directory inside the working tree, or a bare
    /// repository directory.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let raw = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: git2::Repository) -> Self {
        let git_dir = raw.path().to_path_buf();
        let work_dir = raw.workdir().map(Path::to_path_buf);
        let resource = Resource::root(ResourceKind::Repository);
        tracing::debug!(resource = %resource.id(), git_dir = %git_dir.display(), "opened repository");
        Self {
            inner: Arc::new(RepositoryInner {
                resource,
                raw: Mutex::new(raw),
                git_dir,
                work_dir,
            }),
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.inner.git_dir
    }

    /// The working directory, `None` for a bare repository.
    pub fn work_dir(&self) -> Option<&Path> {
        self.inner.work_dir.as_deref()
    }

    pub fn is_bare(&self) -> bool {
        self.inner.work_dir.is_none()
    }

    /// Whether two handles refer to the same opened repository.
    pub fn same_as(&self, other: &Repository) -> bool {
        self.inner.resource.same_as(&other.inner.resource)
    }

    /// Run `f` against the native repository.
    ///
    /// Callers inside a task execution phase already hold the repository's
    /// lock key; the internal mutex only makes the handle shareable.
    pub(crate) fn with_raw<R>(&self, f: impl FnOnce(&git2::Repository) -> R) -> R {
        let raw = self.inner.raw.lock().unwrap_or_else(PoisonError::into_inner);
        f(&raw)
    }

    /// The repository's index.
    pub fn index(&self) -> Result<Index, GitError> {
        self.with_raw(|repo| repo.index().map(drop))
            .map_err(|e| GitError::from_git2(e, "index"))?;
        Ok(Index::owned(self))
    }

    /// Resolve `spec` (any revision expression) and peel it to a tree.
    pub fn find_tree(&self, spec: &str) -> Result<Tree, GitError> {
        let id = self.peel(spec, git2::ObjectType::Tree, "tree")?;
        Ok(Tree::new(self, id))
    }

    /// Resolve `spec` and peel it to a commit.
    pub fn find_commit(&self, spec: &str) -> Result<Commit, GitError> {
        let id = self.peel(spec, git2::ObjectType::Commit, "commit")?;
        Ok(Commit::new(self, id))
    }

    /// Resolve `spec` to a blob, e.g. `HEAD:src/main.rs` or a blob id.
    pub fn find_blob(&self, spec: &str) -> Result<Blob, GitError> {
        let id = self.peel(spec, git2::ObjectType::Blob, "blob")?;
        Ok(Blob::new(self, id))
    }

    fn peel(
        &self,
        spec: &str,
        kind: git2::ObjectType,
        expected: &'static str,
    ) -> Result<git2::Oid, GitError> {
        self.with_raw(|repo| {
            let object = repo
                .revparse_single(spec)
                .map_err(|e| GitError::from_git2(e, spec))?;
            let peeled = object.peel(kind).map_err(|_| GitError::WrongKind {
                spec: spec.to_string(),
                expected,
            })?;
            Ok(peeled.id())
        })
    }
}

impl AsResource for Repository {
    fn resource(&self) -> &Resource {
        &self.inner.resource
    }
}
