//! history command

use anyhow::Result;

use super::Session;
use crate::core::types::Oid;
use crate::ops::{ChangeStatus, FileHistoryWalk, HistoryEntry};
use crate::ui::output;

fn describe(entry: &HistoryEntry) -> String {
    let status = match entry.status {
        ChangeStatus::Added => "added",
        ChangeStatus::Deleted => "deleted",
        ChangeStatus::Modified => "modified",
        ChangeStatus::Renamed => "renamed",
    };
    let mut line = format!(
        "{} {:<8} {} {}",
        entry.commit.oid.short(7),
        status,
        entry.commit.author_time.format("%Y-%m-%d"),
        entry.commit.summary
    );
    if let (Some(old), Some(new)) = (&entry.old_name, &entry.new_name) {
        line.push_str(&format!(" ({} -> {})", old, new));
    }
    if entry.is_merge {
        line.push_str(" [merge]");
    }
    line
}

pub fn history(
    session: &mut Session,
    path: &str,
    rev: &str,
    from: &[String],
    max_count: usize,
) -> Result<()> {
    let repository = session.repository.clone();
    let frontier = if from.is_empty() {
        vec![repository.find_commit(rev)?.id()]
    } else {
        from.iter()
            .map(|id| Oid::new(id.as_str()))
            .collect::<Result<Vec<_>, _>>()?
    };

    session.run(
        |callback| FileHistoryWalk::resume(&repository, frontier, path, max_count, callback),
        |out, history| {
            out.emit(&history, history.entries.iter().map(describe))?;
            if !out.json && !history.reached_end_of_history {
                let ids: Vec<&str> = history.resume_from.iter().map(Oid::as_str).collect();
                output::print(
                    &format!("(more history available: --from {})", ids.join(" ")),
                    out.verbosity,
                );
            }
            Ok(())
        },
    )
}
