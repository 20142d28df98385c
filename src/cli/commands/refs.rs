//! refs, remotes and submodules commands

use anyhow::Result;

use super::Session;
use crate::ops::{GetReferences, GetReferencesFromList, GetRemotes, GetSubmodules};

pub fn list(session: &mut Session) -> Result<()> {
    let repository = session.repository.clone();
    session.run(
        |callback| Ok(GetReferences::new(&repository, callback)),
        |output, references| {
            let lines = references
                .iter()
                .map(|r| format!("{} {}", r.target.short(7), r.name));
            output.emit(&references, lines)?;
            Ok(())
        },
    )
}

pub fn lookup(session: &mut Session, names: Vec<String>) -> Result<()> {
    let repository = session.repository.clone();
    let requested = names.clone();
    session.run(
        |callback| GetReferencesFromList::new(&repository, names, callback),
        move |output, found| {
            let lines = requested
                .iter()
                .zip(&found)
                .map(|(name, reference)| match reference {
                    Some(r) => format!("{}: {} {}", name, r.target.short(7), r.name),
                    None => format!("{}: not found", name),
                });
            output.emit(&found, lines)?;
            Ok(())
        },
    )
}

pub fn remotes(session: &mut Session) -> Result<()> {
    let repository = session.repository.clone();
    session.run(
        |callback| Ok(GetRemotes::new(&repository, callback)),
        |output, remotes| {
            let lines = remotes.iter().map(|remote| {
                format!("{}\t{}", remote.name, remote.url.as_deref().unwrap_or("-"))
            });
            output.emit(&remotes, lines)?;
            Ok(())
        },
    )
}

pub fn submodules(session: &mut Session) -> Result<()> {
    let repository = session.repository.clone();
    session.run(
        |callback| Ok(GetSubmodules::new(&repository, callback)),
        |output, submodules| {
            let lines = submodules.iter().map(|submodule| {
                let head = submodule
                    .head_id
                    .as_ref()
                    .map_or("-------", |oid| oid.short(7));
                format!(
                    "{} {}\t{}",
                    head,
                    submodule.path,
                    submodule.url.as_deref().unwrap_or("-")
                )
            });
            output.emit(&submodules, lines)?;
            Ok(())
        },
    )
}
