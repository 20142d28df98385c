//! ops::file_history
//!
//! History of a single path.
//!
//! # Algorithm
//!
//! Commits are visited newest first (by committer time) starting from a
//! given commit. For each commit the tree entry at the path is compared
//! with the entry in each parent:
//!
//! - a root commit containing the path reports `Added`
//! - a merge with a parent whose entry is identical follows only that
//!   parent and reports nothing (history simplification)
//! - a merge that differs from every parent follows all of them and
//!   reports the change against its parents, flagged `is_merge`
//! - a single-parent commit reports `Added`, `Deleted` or `Modified` when
//!   the entry changed
//!
//! An `Added` or `Deleted` report gets a second pass: the full tree diff
//! against the parent is run through rename detection, and a rename that
//! involves the path turns the report into `Renamed` with both names.
//!
//! The walk stops after visiting `max_count` commits. The commits still
//! waiting are returned as `resume_from`; handing them to
//! [`FileHistoryWalk::resume`] continues where the walk stopped.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::path::Path;

use serde::Serialize;

use super::ValidationError;
use crate::core::types::Oid;
use crate::engine::{Callback, Task, TaskError};
use crate::git::{oid_from_raw, raw_from_oid, CommitInfo, Repository};
use crate::lock::ResourceSet;

const NAME: &str = "Revwalk.fileHistoryWalk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub commit: CommitInfo,
    pub status: ChangeStatus,
    /// Previous name, for renames
    pub old_name: Option<String>,
    /// New name, for renames
    pub new_name: Option<String>,
    /// The commit is a merge whose entry matches none of its parents
    pub is_merge: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHistory {
    pub entries: Vec<HistoryEntry>,
    pub reached_end_of_history: bool,
    /// Commits left unvisited, newest first; empty at the end of history
    pub resume_from: Vec<Oid>,
}

/// Walk the history of `path`.
pub struct FileHistoryWalk {
    repository: Repository,
    start: Vec<Oid>,
    path: String,
    max_count: usize,
    resources: ResourceSet,
    callback: Callback<FileHistory>,
}

impl FileHistoryWalk {
    /// # Errors
    ///
    /// - [`ValidationError::EmptyPath`] if `path` is empty
    /// - [`ValidationError::ZeroMaxCount`] if `max_count` is zero
    pub fn new(
        repository: &Repository,
        start: Oid,
        path: impl Into<String>,
        max_count: usize,
        callback: Callback<FileHistory>,
    ) -> Result<Self, ValidationError> {
        Self::resume(repository, vec![start], path, max_count, callback)
    }

    /// Continue a walk from the `resume_from` commits of an earlier page.
    ///
    /// An empty `frontier` completes at once with `reached_end_of_history`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn resume(
        repository: &Repository,
        frontier: Vec<Oid>,
        path: impl Into<String>,
        max_count: usize,
        callback: Callback<FileHistory>,
    ) -> Result<Self, ValidationError> {
        let path = path.into();
        let path = path.trim_matches('/').to_string();
        if path.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        if max_count == 0 {
            return Err(ValidationError::ZeroMaxCount);
        }
        Ok(Self {
            repository: repository.clone(),
            start: frontier,
            path,
            max_count,
            resources: ResourceSet::new().with(repository),
            callback,
        })
    }
}

/// Identity of the tree entry at a path: (blob or tree id, file mode).
type EntryId = Option<(git2::Oid, i32)>;

fn entry_at(tree: &git2::Tree<'_>, path: &str) -> Result<EntryId, TaskError> {
    match tree.get_path(Path::new(path)) {
        Ok(entry) => Ok(Some((entry.id(), entry.filemode()))),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(TaskError::engine(NAME, e)),
    }
}

/// Commits waiting to be visited, newest first.
struct Frontier {
    heap: BinaryHeap<(i64, Reverse<u64>, git2::Oid)>,
    seen: HashSet<git2::Oid>,
    seq: u64,
}

impl Frontier {
    fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seen: HashSet::new(),
            seq: 0,
        }
    }

    fn push(&mut self, commit: &git2::Commit<'_>) {
        if self.seen.insert(commit.id()) {
            self.seq += 1;
            self.heap
                .push((commit.time().seconds(), Reverse(self.seq), commit.id()));
        }
    }

    fn pop(&mut self) -> Option<git2::Oid> {
        self.heap.pop().map(|(_, _, id)| id)
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Unvisited commits, newest first.
    fn into_pending(self) -> Vec<Oid> {
        let mut pending = self.heap.into_sorted_vec();
        pending.reverse();
        pending.into_iter().map(|(_, _, id)| oid_from_raw(id)).collect()
    }
}

/// Status of a merge whose entry at the path matches none of its parents.
fn merge_status(current: EntryId, parents: &[EntryId]) -> Option<ChangeStatus> {
    let in_parent = parents.iter().any(Option::is_some);
    match (current, in_parent) {
        (Some(_), true) => Some(ChangeStatus::Modified),
        (Some(_), false) => Some(ChangeStatus::Added),
        (None, true) => Some(ChangeStatus::Deleted),
        (None, false) => None,
    }
}

fn diff_path(file: &git2::DiffFile<'_>) -> Option<String> {
    file.path().map(|p| p.to_string_lossy().into_owned())
}

/// Look for a rename involving `path` between `parent` and `current`.
///
/// Returns `(old_name, new_name)`.
fn detect_rename(
    repo: &git2::Repository,
    parent: &git2::Tree<'_>,
    current: &git2::Tree<'_>,
    path: &str,
    status: ChangeStatus,
) -> Result<Option<(String, String)>, TaskError> {
    let mut diff = repo
        .diff_tree_to_tree(Some(parent), Some(current), None)
        .map_err(|e| TaskError::engine(NAME, e))?;
    let mut find = git2::DiffFindOptions::new();
    find.renames(true);
    diff.find_similar(Some(&mut find))
        .map_err(|e| TaskError::engine(NAME, e))?;

    for delta in diff.deltas() {
        if delta.status() != git2::Delta::Renamed {
            continue;
        }
        let (Some(old_name), Some(new_name)) = (diff_path(&delta.old_file()), diff_path(&delta.new_file()))
        else {
            continue;
        };
        let involved = match status {
            ChangeStatus::Added => new_name == path,
            ChangeStatus::Deleted => old_name == path,
            _ => false,
        };
        if involved {
            return Ok(Some((old_name, new_name)));
        }
    }
    Ok(None)
}

impl Task for FileHistoryWalk {
    type Output = FileHistory;

    fn name(&self) -> &'static str {
        NAME
    }

    fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    fn execute(&mut self) -> Result<Self::Output, TaskError> {
        let start = self
            .start
            .iter()
            .map(raw_from_oid)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TaskError::inconsistent(NAME, e.to_string()))?;
        let path = self.path.as_str();
        let max_count = self.max_count;

        self.repository.with_raw(|repo| {
            let mut frontier = Frontier::new();
            for id in start {
                let commit = repo
                    .find_commit(id)
                    .map_err(|e| TaskError::engine(NAME, e))?;
                frontier.push(&commit);
            }

            let mut entries = Vec::new();
            let mut visited = 0;
            while visited < max_count {
                let Some(id) = frontier.pop() else {
                    break;
                };
                visited += 1;

                let commit = repo.find_commit(id).map_err(|e| {
                    TaskError::inconsistent(NAME, format!("commit {} vanished: {}", id, e.message()))
                })?;
                let tree = commit.tree().map_err(|e| TaskError::engine(NAME, e))?;
                let current = entry_at(&tree, path)?;

                let parents: Vec<git2::Commit<'_>> = commit.parents().collect();
                if parents.len() != commit.parent_count() {
                    return Err(TaskError::inconsistent(
                        NAME,
                        format!("parents of {} could not all be read", id),
                    ));
                }

                let mut is_merge = false;
                let status = match parents.as_slice() {
                    [] => current.map(|_| ChangeStatus::Added),
                    [parent] => {
                        frontier.push(parent);
                        let parent_tree = parent.tree().map_err(|e| TaskError::engine(NAME, e))?;
                        let previous = entry_at(&parent_tree, path)?;
                        match (previous, current) {
                            (None, Some(_)) => Some(ChangeStatus::Added),
                            (Some(_), None) => Some(ChangeStatus::Deleted),
                            (Some(a), Some(b)) if a != b => Some(ChangeStatus::Modified),
                            _ => None,
                        }
                    }
                    merge_parents => {
                        let mut previous = Vec::with_capacity(merge_parents.len());
                        let mut same = None;
                        for parent in merge_parents {
                            let parent_tree =
                                parent.tree().map_err(|e| TaskError::engine(NAME, e))?;
                            let entry = entry_at(&parent_tree, path)?;
                            if entry == current {
                                same = Some(parent);
                                break;
                            }
                            previous.push(entry);
                        }
                        match same {
                            Some(parent) => {
                                frontier.push(parent);
                                None
                            }
                            None => {
                                merge_parents.iter().for_each(|p| frontier.push(p));
                                is_merge = true;
                                merge_status(current, &previous)
                            }
                        }
                    }
                };

                let Some(status) = status else {
                    continue;
                };

                let mut entry = HistoryEntry {
                    commit: CommitInfo::from_raw(&commit),
                    status,
                    old_name: None,
                    new_name: None,
                    is_merge,
                };

                if let (ChangeStatus::Added | ChangeStatus::Deleted, [parent]) =
                    (status, parents.as_slice())
                {
                    let parent_tree = parent.tree().map_err(|e| TaskError::engine(NAME, e))?;
                    if let Some((old_name, new_name)) =
                        detect_rename(repo, &parent_tree, &tree, path, status)?
                    {
                        entry.status = ChangeStatus::Renamed;
                        entry.old_name = Some(old_name);
                        entry.new_name = Some(new_name);
                    }
                }

                entries.push(entry);
            }

            let reached_end_of_history = frontier.is_empty();
            tracing::debug!(
                path,
                visited,
                entries = entries.len(),
                reached_end_of_history,
                "file history walked"
            );
            Ok(FileHistory {
                entries,
                reached_end_of_history,
                resume_from: frontier.into_pending(),
            })
        })
    }

    fn on_success(self, output: Self::Output) {
        (self.callback)(Ok(output))
    }

    fn on_failure(self, error: TaskError) {
        (self.callback)(Err(error))
    }
}
