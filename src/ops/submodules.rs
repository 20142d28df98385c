//! ops::submodules
//!
//! Submodule listing.

use serde::Serialize;

use crate::core::types::Oid;
use crate::engine::{Callback, Task, TaskError};
use crate::git::{oid_from_raw, Repository};
use crate::lock::ResourceSet;

/// A submodule as recorded by the superproject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmoduleInfo {
    pub name: String,
    /// Path relative to the superproject's working directory
    pub path: String,
    pub url: Option<String>,
    /// Commit recorded in the superproject's HEAD tree
    pub head_id: Option<Oid>,
}

/// Every submodule of the repository.
pub struct GetSubmodules {
    repository: Repository,
    resources: ResourceSet,
    callback: Callback<Vec<SubmoduleInfo>>,
}

impl GetSubmodules {
    const NAME: &'static str = "Repository.getSubmodules";

    pub fn new(repository: &Repository, callback: Callback<Vec<SubmoduleInfo>>) -> Self {
        Self {
            repository: repository.clone(),
            resources: ResourceSet::new().with(repository),
            callback,
        }
    }
}

impl Task for GetSubmodules {
    type Output = Vec<SubmoduleInfo>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    fn execute(&mut self) -> Result<Self::Output, TaskError> {
        self.repository.with_raw(|repo| {
            let submodules = repo
                .submodules()
                .map_err(|e| TaskError::engine(Self::NAME, e))?;
            Ok(submodules
                .iter()
                .map(|submodule| SubmoduleInfo {
                    name: String::from_utf8_lossy(submodule.name_bytes()).into_owned(),
                    path: submodule.path().to_string_lossy().into_owned(),
                    url: submodule.url().map(str::to_string),
                    head_id: submodule.head_id().map(oid_from_raw),
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
