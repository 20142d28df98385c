//! ops::index_paths
//!
//! Entries of a staging index, owned or detached.

use serde::Serialize;

use crate::core::types::Oid;
use crate::engine::{Callback, Task, TaskError};
use crate::git::{oid_from_raw, Index};
use crate::lock::ResourceSet;

/// Stage bits of an index entry's flags.
const STAGE_MASK: u16 = 0x3000;
const STAGE_SHIFT: u16 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntryInfo {
    pub path: String,
    pub oid: Oid,
    pub mode: u32,
    /// 0 for a normal entry, 1-3 for the sides of a conflict
    pub stage: u8,
}

pub struct GetIndexPaths {
    index: Index,
    resources: ResourceSet,
    callback: Callback<Vec<IndexEntryInfo>>,
}

impl GetIndexPaths {
    const NAME: &'static str = "Index.getPaths";

    pub fn new(index: &Index, callback: Callback<Vec<IndexEntryInfo>>) -> Self {
        Self {
            index: index.clone(),
            resources: ResourceSet::new().with(index),
            callback,
        }
    }
}

impl Task for GetIndexPaths {
    type Output = Vec<IndexEntryInfo>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    fn execute(&mut self) -> Result<Self::Output, TaskError> {
        self.index
            .with_raw(|index| {
                index
                    .iter()
                    .map(|entry| IndexEntryInfo {
                        path: String::from_utf8_lossy(&entry.path).into_owned(),
                        oid: oid_from_raw(entry.id),
                        mode: entry.mode,
                        stage: ((entry.flags & STAGE_MASK) >> STAGE_SHIFT) as u8,
                    })
                    .collect()
            })
            .map_err(|e| TaskError::engine(Self::NAME, e))
    }

    fn on_success(self, output: Self::Output) {
        (self.callback)(Ok(output))
    }

    fn on_failure(self, error: TaskError) {
        (self.callback)(Err(error))
    }
}
