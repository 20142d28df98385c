//! ops::blob_diff
//!
//! Line-level edit script between two blobs.
//!
//! Each emitted line of the diff becomes a [`DiffPoint`] carrying the line
//! origin (`' '` context, `'+'` added, `'-'` removed, plus the engine's
//! end-of-file markers) and the line's number on each side. A side the
//! line does not exist on is reported as `-1`.

use std::cell::Cell;

use serde::Serialize;

use super::ValidationError;
use crate::engine::{Callback, Task, TaskError};
use crate::git::{Blob, Repository};
use crate::lock::ResourceSet;

/// Diff knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSettings {
    pub context_lines: u32,
    pub ignore_whitespace: bool,
    pub ignore_whitespace_change: bool,
    pub ignore_whitespace_eol: bool,
}

impl Default for DiffSettings {
    fn default() -> Self {
        Self {
            context_lines: 3,
            ignore_whitespace: false,
            ignore_whitespace_change: false,
            ignore_whitespace_eol: false,
        }
    }
}

impl DiffSettings {
    fn to_options(&self) -> git2::DiffOptions {
        let mut options = git2::DiffOptions::new();
        options
            .context_lines(self.context_lines)
            .ignore_whitespace(self.ignore_whitespace)
            .ignore_whitespace_change(self.ignore_whitespace_change)
            .ignore_whitespace_eol(self.ignore_whitespace_eol);
        options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffPoint {
    pub origin: char,
    pub old_line: i64,
    pub new_line: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SesResult {
    pub diff_points: Vec<DiffPoint>,
    /// Set when either blob is binary; no line points are produced then.
    pub was_binary: bool,
}

/// Compute the edit script from `old` to `new`.
pub struct CalculateSes {
    repository: Repository,
    old: Blob,
    new: Blob,
    settings: DiffSettings,
    resources: ResourceSet,
    callback: Callback<SesResult>,
}

impl CalculateSes {
    const NAME: &'static str = "Diff.calculateSes";

    /// # Errors
    ///
    /// [`ValidationError::ForeignBlob`] if either blob was looked up in a
    /// different repository handle.
    pub fn new(
        repository: &Repository,
        old: &Blob,
        new: &Blob,
        settings: DiffSettings,
        callback: Callback<SesResult>,
    ) -> Result<Self, ValidationError> {
        if !old.repository().same_as(repository) {
            return Err(ValidationError::ForeignBlob { which: "old" });
        }
        if !new.repository().same_as(repository) {
            return Err(ValidationError::ForeignBlob { which: "new" });
        }
        Ok(Self {
            repository: repository.clone(),
            old: old.clone(),
            new: new.clone(),
            settings,
            resources: ResourceSet::new().with(repository).with(old).with(new),
            callback,
        })
    }
}

fn line_number(number: Option<u32>) -> i64 {
    number.map_or(-1, i64::from)
}

impl Task for CalculateSes {
    type Output = SesResult;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    fn execute(&mut self) -> Result<Self::Output, TaskError> {
        let (old_id, new_id) = (self.old.raw_id(), self.new.raw_id());
        let mut options = self.settings.to_options();

        self.repository.with_raw(|repo| {
            let old = repo
                .find_blob(old_id)
                .map_err(|e| TaskError::engine(Self::NAME, e))?;
            let new = repo
                .find_blob(new_id)
                .map_err(|e| TaskError::engine(Self::NAME, e))?;

            let was_binary = Cell::new(false);
            let mut diff_points = Vec::new();

            repo.diff_blobs(
                Some(&old),
                None,
                Some(&new),
                None,
                Some(&mut options),
                Some(&mut |delta: git2::DiffDelta<'_>, _progress: f32| {
                    if delta.flags().is_binary() {
                        was_binary.set(true);
                    }
                    true
                }),
                Some(&mut |_delta: git2::DiffDelta<'_>, _binary: git2::DiffBinary<'_>| {
                    was_binary.set(true);
                    true
                }),
                None,
                Some(&mut |_delta: git2::DiffDelta<'_>,
                           _hunk: Option<git2::DiffHunk<'_>>,
                           line: git2::DiffLine<'_>| {
                    diff_points.push(DiffPoint {
                        origin: line.origin(),
                        old_line: line_number(line.old_lineno()),
                        new_line: line_number(line.new_lineno()),
                    });
                    true
                }),
            )
            .map_err(|e| TaskError::engine(Self::NAME, e))?;

            Ok(SesResult {
                diff_points,
                was_binary: was_binary.get(),
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
