//! paths, diff-blobs and index commands

use anyhow::Result;

use super::Session;
use crate::ops::{CalculateSes, DiffSettings, GetIndexPaths, GetTreePaths};
use crate::ui::output::format_line_number;

pub fn paths(session: &mut Session, rev: &str) -> Result<()> {
    let tree = session.repository.find_tree(rev)?;
    session.run(
        |callback| Ok(GetTreePaths::new(&tree, callback)),
        |output, paths| {
            output.emit(&paths, &paths)?;
            Ok(())
        },
    )
}

pub fn diff_blobs(
    session: &mut Session,
    old: &str,
    new: &str,
    context_lines: u32,
    ignore_whitespace: bool,
) -> Result<()> {
    let repository = session.repository.clone();
    let old = repository.find_blob(old)?;
    let new = repository.find_blob(new)?;
    let settings = DiffSettings {
        context_lines,
        ignore_whitespace,
        ..DiffSettings::default()
    };

    session.run(
        |callback| CalculateSes::new(&repository, &old, &new, settings, callback),
        |output, ses| {
            let lines: Vec<String> = if ses.was_binary {
                vec!["binary blobs differ".to_string()]
            } else {
                ses.diff_points
                    .iter()
                    .map(|point| {
                        format!(
                            "{} {:>5} {:>5}",
                            point.origin,
                            format_line_number(point.old_line),
                            format_line_number(point.new_line)
                        )
                    })
                    .collect()
            };
            output.emit(&ses, lines)?;
            Ok(())
        },
    )
}

pub fn index(session: &mut Session) -> Result<()> {
    let index = session.repository.index()?;
    session.run(
        |callback| Ok(GetIndexPaths::new(&index, callback)),
        |output, entries| {
            let lines = entries.iter().map(|entry| {
                format!("{:06o} {} {}\t{}", entry.mode, entry.oid, entry.stage, entry.path)
            });
            output.emit(&entries, lines)?;
            Ok(())
        },
    )
}
