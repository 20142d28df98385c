//! ops::remotes
//!
//! Remote listing.
//!
//! The shared repository handle is used only to open a private handle on
//! the same git directory. Remote configuration is then read through the
//! private handle with the repository's key temporarily released, so other
//! operations on the repository are not held up by config parsing.

use serde::Serialize;

use crate::engine::{Callback, Task, TaskError};
use crate::git::Repository;
use crate::lock::{ResourceSet, TemporaryUnlock};

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteInfo {
    pub name: String,
    pub url: Option<String>,
    pub push_url: Option<String>,
}

/// Every remote configured for the repository.
pub struct GetRemotes {
    repository: Repository,
    resources: ResourceSet,
    callback: Callback<Vec<RemoteInfo>>,
}

impl GetRemotes {
    const NAME: &'static str = "Repository.getRemotes";

    pub fn new(repository: &Repository, callback: Callback<Vec<RemoteInfo>>) -> Self {
        Self {
            repository: repository.clone(),
            resources: ResourceSet::new().with(repository),
            callback,
        }
    }
}

impl Task for GetRemotes {
    type Output = Vec<RemoteInfo>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    fn execute(&mut self) -> Result<Self::Output, TaskError> {
        let private = self
            .repository
            .with_raw(|repo| git2::Repository::open(repo.path()))
            .map_err(|e| TaskError::engine(Self::NAME, e))?;

        let _unlock = TemporaryUnlock::acquire();

        let names = private
            .remotes()
            .map_err(|e| TaskError::engine(Self::NAME, e))?;

        let mut out = Vec::with_capacity(names.len());
        for name in names.iter().flatten() {
            let remote = private
                .find_remote(name)
                .map_err(|e| TaskError::engine(Self::NAME, e))?;
            out.push(RemoteInfo {
                name: name.to_string(),
                url: remote.url().map(str::to_string),
                push_url: remote.pushurl().map(str::to_string),
            });
        }
        Ok(out)
    }

    fn on_success(self, output: Self::Output) {
        (self.callback)(Ok(output))
    }

    fn on_failure(self, error: TaskError) {
        (self.callback)(Err(error))
    }
}
