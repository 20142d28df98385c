//! engine::dispatcher
//!
//! Marshals completion phases back onto the host thread.
//!
//! # Design
//!
//! Workers never run completion code. They push a boxed completion onto an
//! unbounded queue; the host drains it from its own thread, one completion
//! at a time. Completions therefore never overlap each other or any other
//! work on the host thread.
//!
//! The host picks how it drains:
//!
//! - [`Dispatcher::run_pending`] between other host work (never blocks)
//! - [`Dispatcher::run_until_idle`] to block until everything submitted has
//!   completed
//! - [`Dispatcher::run_next`] from an async host loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::task::TaskId;

pub(crate) struct Completion {
    pub(crate) task: TaskId,
    pub(crate) run: Box<dyn FnOnce() + Send + 'static>,
}

/// Sending half handed to schedulers.
#[derive(Clone)]
pub(crate) struct CompletionSender {
    tx: mpsc::UnboundedSender<Completion>,
    in_flight: Arc<AtomicUsize>,
}

impl CompletionSender {
    /// Count a task as in flight until its completion has run.
    pub(crate) fn track(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn send(&self, completion: Completion) {
        let task = completion.task;
        if self.tx.send(completion).is_err() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(%task, "dispatcher dropped; completion discarded");
        }
    }
}

/// Host-side completion queue.
///
/// Create it on the host thread and keep it there: whichever thread drives
/// it is the host thread.
pub struct Dispatcher {
    rx: mpsc::UnboundedReceiver<Completion>,
    sender: CompletionSender,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            sender: CompletionSender {
                tx,
                in_flight: Arc::new(AtomicUsize::new(0)),
            },
        }
    }

    pub(crate) fn sender(&self) -> CompletionSender {
        self.sender.clone()
    }

    /// Tasks submitted whose completion has not run yet.
    pub fn in_flight(&self) -> usize {
        self.sender.in_flight.load(Ordering::SeqCst)
    }

    /// Run every completion that is ready, without blocking.
    ///
    /// Returns the number of completions run.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.complete(completion);
            ran += 1;
        }
        ran
    }

    /// Block until every submitted task has completed.
    ///
    /// Must not be called from inside an async runtime; async hosts use
    /// [`run_next`](Self::run_next).
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while self.in_flight() > 0 {
            match self.rx.blocking_recv() {
                Some(completion) => {
                    self.complete(completion);
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    /// Wait for and run the next completion.
    ///
    /// Returns `false` without waiting when nothing is in flight.
    pub async fn run_next(&mut self) -> bool {
        if self.in_flight() == 0 {
            return false;
        }
        match self.rx.recv().await {
            Some(completion) => {
                self.complete(completion);
                true
            }
            None => false,
        }
    }

    fn complete(&mut self, completion: Completion) {
        let Completion { task, run } = completion;
        run();
        self.sender.in_flight.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(%task, state = "completed", "completion ran on host thread");
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn completion(id: u64, log: &Arc<Mutex<Vec<u64>>>) -> Completion {
        let log = Arc::clone(log);
        Completion {
            task: TaskId(id),
            run: Box::new(move || log.lock().unwrap().push(id)),
        }
    }

    #[test]
    fn run_pending_drains_ready_completions() {
        let mut dispatcher = Dispatcher::new();
        let sender = dispatcher.sender();
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            sender.track();
            sender.send(completion(id, &log));
        }

        assert_eq!(dispatcher.in_flight(), 3);
        assert_eq!(dispatcher.run_pending(), 3);
        assert_eq!(dispatcher.in_flight(), 0);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(dispatcher.run_pending(), 0);
    }

    #[test]
    fn run_until_idle_waits_for_other_threads() {
        let mut dispatcher = Dispatcher::new();
        let sender = dispatcher.sender();
        let log = Arc::new(Mutex::new(Vec::new()));

        sender.track();
        let worker_log = Arc::clone(&log);
        let worker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            sender.send(completion(7, &worker_log));
        });

        assert_eq!(dispatcher.run_until_idle(), 1);
        worker.join().unwrap();
        assert_eq!(*log.lock().unwrap(), vec![7]);
    }

    #[test]
    fn idle_dispatcher_returns_immediately() {
        let mut dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.run_until_idle(), 0);
    }

    #[tokio::test]
    async fn run_next_drives_async_host() {
        let mut dispatcher = Dispatcher::new();
        let sender = dispatcher.sender();
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in [1, 2] {
            sender.track();
            let worker_log = Arc::clone(&log);
            let sender = sender.clone();
            std::thread::spawn(move || sender.send(completion(id, &worker_log)));
        }

        assert!(dispatcher.run_next().await);
        assert!(dispatcher.run_next().await);
        assert!(!dispatcher.run_next().await);

        let mut seen = log.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
    }
}
