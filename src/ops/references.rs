//! ops::references
//!
//! Reference listing and list lookup.
//!
//! Symbolic references are resolved to the direct reference they point at.
//! A symbolic reference that cannot be resolved is skipped by the listing
//! and reported as `None` by the list lookup.

use serde::Serialize;

use super::ValidationError;
use crate::core::types::Oid;
use crate::engine::{Callback, Task, TaskError};
use crate::git::{oid_from_raw, Repository};
use crate::lock::ResourceSet;

/// Namespace a reference lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Branch,
    RemoteBranch,
    Tag,
    Note,
    Other,
}

/// A resolved, direct reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceInfo {
    /// Full name, e.g. `refs/heads/main`
    pub name: String,
    /// Short name, e.g. `main`
    pub shorthand: String,
    pub target: Oid,
    pub kind: ReferenceKind,
}

impl ReferenceInfo {
    fn from_raw(reference: &git2::Reference<'_>) -> Option<Self> {
        let target = reference.target()?;
        let kind = if reference.is_branch() {
            ReferenceKind::Branch
        } else if reference.is_remote() {
            ReferenceKind::RemoteBranch
        } else if reference.is_tag() {
            ReferenceKind::Tag
        } else if reference.is_note() {
            ReferenceKind::Note
        } else {
            ReferenceKind::Other
        };
        Some(Self {
            name: String::from_utf8_lossy(reference.name_bytes()).into_owned(),
            shorthand: String::from_utf8_lossy(reference.shorthand_bytes()).into_owned(),
            target: oid_from_raw(target),
            kind,
        })
    }
}

/// Follow a symbolic reference; direct references pass through.
fn resolve<'r>(reference: git2::Reference<'r>) -> Option<git2::Reference<'r>> {
    match reference.kind() {
        Some(git2::ReferenceType::Symbolic) => reference.resolve().ok(),
        _ => Some(reference),
    }
}

/// Every reference in the repository.
pub struct GetReferences {
    repository: Repository,
    resources: ResourceSet,
    callback: Callback<Vec<ReferenceInfo>>,
}

impl GetReferences {
    const NAME: &'static str = "Repository.getReferences";

    pub fn new(repository: &Repository, callback: Callback<Vec<ReferenceInfo>>) -> Self {
        Self {
            repository: repository.clone(),
            resources: ResourceSet::new().with(repository),
            callback,
        }
    }
}

impl Task for GetReferences {
    type Output = Vec<ReferenceInfo>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    fn execute(&mut self) -> Result<Self::Output, TaskError> {
        self.repository.with_raw(|repo| {
            let names: Vec<String> = repo
                .references()
                .map_err(|e| TaskError::engine(Self::NAME, e))?
                .names()
                .map(|name| name.map(str::to_string))
                .collect::<Result<_, _>>()
                .map_err(|e| TaskError::engine(Self::NAME, e))?;

            let mut out = Vec::with_capacity(names.len());
            for name in &names {
                let reference = repo
                    .find_reference(name)
                    .map_err(|e| TaskError::engine(Self::NAME, e))?;
                if let Some(info) = resolve(reference).as_ref().and_then(ReferenceInfo::from_raw) {
                    out.push(info);
                }
            }
            Ok(out)
        })
    }

    fn on_success(self, output: Self::Output) {
        (self.callback)(Ok(output))
    }

    fn on_failure(self, error: TaskError) {
        (self.callback)(Err(error))
    }
}

/// Look up each name, accepting the same short forms `git` does.
///
/// The result has one slot per requested name, in request order.
pub struct GetReferencesFromList {
    repository: Repository,
    names: Vec<String>,
    resources: ResourceSet,
    callback: Callback<Vec<Option<ReferenceInfo>>>,
}

impl GetReferencesFromList {
    const NAME: &'static str = "Repository.getReferencesFromList";

    pub fn new(
        repository: &Repository,
        names: Vec<String>,
        callback: Callback<Vec<Option<ReferenceInfo>>>,
    ) -> Result<Self, ValidationError> {
        if let Some(index) = names.iter().position(|name| name.trim().is_empty()) {
            return Err(ValidationError::EmptyReferenceName { index });
        }
        Ok(Self {
            repository: repository.clone(),
            names,
            resources: ResourceSet::new().with(repository),
            callback,
        })
    }
}

impl Task for GetReferencesFromList {
    type Output = Vec<Option<ReferenceInfo>>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    fn execute(&mut self) -> Result<Self::Output, TaskError> {
        self.repository.with_raw(|repo| {
            Ok(self
                .names
                .iter()
                .map(|name| {
                    repo.resolve_reference_from_short_name(name)
                        .ok()
                        .and_then(resolve)
                        .as_ref()
                        .and_then(ReferenceInfo::from_raw)
                })
                .collect())
        })
    }

    fn on_success(self, output: Self::Output) {
        (self.callback)(Ok(output))
    }

    fn on_failure(self, error: TaskError) {
        (self.callback)(Err(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{run_op, TestRepo};

    fn fixture() -> (TestRepo, String) {
        let repo = TestRepo::new();
        let head = repo.commit_file("a.txt", "a\n", "first");
        repo.git(&["branch", "feature"]);
        repo.git(&["tag", "v1.0"]);
        repo.git(&["symbolic-ref", "refs/heads/alias", "refs/heads/feature"]);
        (repo, head)
    }

    #[test]
    fn lists_and_resolves_references() {
        let (fixture, head) = fixture();
        let repo = fixture.open();

        let refs = run_op(|cb| GetReferences::new(&repo, cb)).unwrap();
        let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();

        assert!(names.contains(&"refs/heads/main"));
        assert!(names.contains(&"refs/tags/v1.0"));
        // The alias resolves to the branch it points at.
        assert_eq!(names.iter().filter(|n| **n == "refs/heads/feature").count(), 2);
        assert!(!names.contains(&"refs/heads/alias"));
        assert!(refs.iter().all(|r| r.target.as_str() == head));

        let tag = refs.iter().find(|r| r.name == "refs/tags/v1.0").unwrap();
        assert_eq!(tag.kind, ReferenceKind::Tag);
        assert_eq!(tag.shorthand, "v1.0");
    }

    #[test]
    fn dangling_symbolic_reference_is_skipped() {
        let (fixture, _) = fixture();
        fixture.git(&["symbolic-ref", "refs/heads/dangling", "refs/heads/missing"]);
        let repo = fixture.open();

        let refs = run_op(|cb| GetReferences::new(&repo, cb)).unwrap();
        assert!(refs.iter().all(|r| r.name != "refs/heads/dangling"));
    }

    #[test]
    fn list_lookup_keeps_positions() {
        let (fixture, head) = fixture();
        let repo = fixture.open();
        let names = vec![
            "feature".to_string(),
            "nope".to_string(),
            "v1.0".to_string(),
            "alias".to_string(),
        ];

        let found = run_op(|cb| GetReferencesFromList::new(&repo, names, cb).unwrap()).unwrap();

        assert_eq!(found.len(), 4);
        assert_eq!(found[0].as_ref().unwrap().name, "refs/heads/feature");
        assert!(found[1].is_none());
        assert_eq!(found[2].as_ref().unwrap().kind, ReferenceKind::Tag);
        assert_eq!(found[3].as_ref().unwrap().name, "refs/heads/feature");
        assert_eq!(found[3].as_ref().unwrap().target.as_str(), head);
    }

    #[test]
    fn blank_names_are_rejected() {
        let (fixture, _) = fixture();
        let repo = fixture.open();
        let err = GetReferencesFromList::new(
            &repo,
            vec!["main".into(), "  ".into()],
            Box::new(|_| {}),
        )
        .err()
        .unwrap();
        assert_eq!(err, ValidationError::EmptyReferenceName { index: 1 });
    }
}
