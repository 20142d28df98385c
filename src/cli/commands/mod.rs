//! cli::commands
//!
//! Command implementations.
//!
//! Each command builds one operation, submits it to the scheduler and
//! drains the dispatcher until it completes. Rendering happens inside the
//! operation's callback, so it runs on the thread that drives the
//! dispatcher.

mod history;
mod objects;
mod refs;

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Result};

use super::args::Command;
use crate::engine::{Callback, Dispatcher, Scheduler, SchedulerConfig, Task, TaskError};
use crate::git::Repository;
use crate::lock::{LockRegistry, ThreadSafety};
use crate::ops::ValidationError;
use crate::ui::output::Output;

/// Everything a command needs to run operations against one repository.
pub struct Session {
    pub repository: Repository,
    pub output: Output,
    dispatcher: Dispatcher,
    scheduler: Scheduler,
}

impl Session {
    pub fn new(
        repository: Repository,
        output: Output,
        thread_safety: ThreadSafety,
        scheduler_config: SchedulerConfig,
    ) -> Result<Self> {
        let registry = LockRegistry::initialize_global(thread_safety);
        let context = registry.initialize_context();
        let dispatcher = Dispatcher::new();
        let scheduler = Scheduler::new(context, &dispatcher, scheduler_config)?;
        Ok(Self {
            repository,
            output,
            dispatcher,
            scheduler,
        })
    }

    /// Build an operation, run it, and render its result.
    ///
    /// `render` runs inside the operation's completion phase.
    pub fn run<T, Op, B, R>(&mut self, build: B, render: R) -> Result<()>
    where
        T: Send + 'static,
        Op: Task,
        B: FnOnce(Callback<T>) -> Result<Op, ValidationError>,
        R: FnOnce(Output, T) -> Result<()> + Send + 'static,
    {
        let outcome: Arc<Mutex<Option<Result<()>>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&outcome);
        let output = self.output;

        let op = build(Box::new(move |result: Result<T, TaskError>| {
            let rendered = result
                .map_err(anyhow::Error::from)
                .and_then(|value| render(output, value));
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(rendered);
        }))?;

        let id = self.scheduler.submit(op);
        self.dispatcher.run_until_idle();

        tracing::debug!(
            task = %id,
            stored_keys = self.scheduler.context().diagnostics().stored_keys,
            "command finished"
        );

        let result = outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        result.unwrap_or_else(|| Err(anyhow!("{} finished without completing", id)))
    }
}

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, session: &mut Session) -> Result<()> {
    match command {
        Command::Refs { names } => {
            if names.is_empty() {
                refs::list(session)
            } else {
                refs::lookup(session, names)
            }
        }
        Command::Remotes => refs::remotes(session),
        Command::Submodules => refs::submodules(session),
        Command::Paths { rev } => objects::paths(session, &rev),
        Command::DiffBlobs {
            old,
            new,
            context,
            ignore_whitespace,
        } => objects::diff_blobs(session, &old, &new, context, ignore_whitespace),
        Command::History {
            path,
            rev,
            from,
            max_count,
        } => history::history(session, &path, &rev, &from, max_count),
        Command::Index => objects::index(session),
    }
}
