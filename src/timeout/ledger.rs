//! In-flight match ledger and per-unit mailboxes.
//!
//! The ledger is the only mutable structure shared between worker threads and
//! the monitor. The monitor removes an expired entry and interrupts its mailbox
//! while holding the ledger lock, so:
//!
//! - a worker whose deregistration still finds its entry was never interrupted;
//! - a worker whose deregistration finds nothing has been interrupted, and
//!   clears the signal before doing anything else.

use crate::error::Result;
use crate::matcher::Capture;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;
use std::time::Instant;

pub(crate) type JobResult = Result<Option<Vec<Capture>>>;

/// Why a waiting worker woke up.
#[derive(Debug)]
pub(crate) enum Wake {
    Finished(JobResult),
    Interrupted,
}

#[derive(Debug, Default)]
struct MailboxState {
    interrupted: bool,
    /// Job the owning worker is waiting for.
    current_job: u64,
    finished: Option<JobResult>,
}

/// Rendezvous between one worker thread, its match executor and the monitor.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    state: Mutex<MailboxState>,
    wake: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MailboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Announce the job the worker is about to wait for. Results of other
    /// jobs are discarded from now on.
    pub fn expect(&self, job: u64) {
        let mut state = self.state();
        state.current_job = job;
        state.finished = None;
    }

    /// Store the result of `job` and wake the worker.
    pub fn deliver(&self, job: u64, result: JobResult) {
        let mut state = self.state();
        if state.current_job != job {
            return;
        }
        state.finished = Some(result);
        self.wake.notify_all();
    }

    pub fn interrupt(&self) {
        self.state().interrupted = true;
        self.wake.notify_all();
    }

    pub fn clear_interrupt(&self) {
        self.state().interrupted = false;
    }

    #[cfg(test)]
    pub fn is_interrupted(&self) -> bool {
        self.state().interrupted
    }

    /// Block until the expected job finishes or the mailbox is interrupted.
    /// A finished result wins over a simultaneous interrupt.
    pub fn wait(&self) -> Wake {
        let mut state = self.state();
        loop {
            if let Some(result) = state.finished.take() {
                return Wake::Finished(result);
            }
            if state.interrupted {
                return Wake::Interrupted;
            }
            state = self
                .wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Debug)]
struct Entry {
    expires: Instant,
    mailbox: Arc<Mailbox>,
}

/// Map of execution unit -> in-flight match.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    entries: Mutex<HashMap<ThreadId, Entry>>,
}

impl Ledger {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ThreadId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, unit: ThreadId, expires: Instant, mailbox: Arc<Mailbox>) {
        self.entries().insert(unit, Entry { expires, mailbox });
    }

    /// Remove the entry of `unit`. Returns `false` if the monitor already
    /// removed it, in which case its mailbox has been interrupted.
    pub fn deregister(&self, unit: ThreadId) -> bool {
        self.entries().remove(&unit).is_some()
    }

    /// Remove and interrupt every entry expired at `now`. Returns the number
    /// of interrupted units.
    pub fn expire(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| {
            if entry.expires <= now {
                entry.mailbox.interrupt();
                false
            } else {
                true
            }
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_expire_removes_and_signals() {
        let ledger = Ledger::new();
        let mailbox = Arc::new(Mailbox::new());
        let unit = thread::current().id();
        let now = Instant::now();

        ledger.register(unit, now, Arc::clone(&mailbox));
        assert_eq!(ledger.len(), 1);

        assert_eq!(ledger.expire(now + Duration::from_millis(1)), 1);
        assert!(ledger.is_empty());
        assert!(mailbox.is_interrupted());
        assert!(!ledger.deregister(unit));
    }

    #[test]
    fn test_unexpired_entry_is_kept() {
        let ledger = Ledger::new();
        let mailbox = Arc::new(Mailbox::new());
        let unit = thread::current().id();
        let now = Instant::now();

        ledger.register(unit, now + Duration::from_secs(60), Arc::clone(&mailbox));
        assert_eq!(ledger.expire(now), 0);
        assert!(!mailbox.is_interrupted());
        assert!(ledger.deregister(unit));
    }

    #[test]
    fn test_stale_delivery_is_ignored() {
        let mailbox = Mailbox::new();
        mailbox.expect(2);
        mailbox.deliver(1, Ok(None));
        mailbox.interrupt();
        assert!(matches!(mailbox.wait(), Wake::Interrupted));
    }

    #[test]
    fn test_finished_wins_over_interrupt() {
        let mailbox = Mailbox::new();
        mailbox.expect(7);
        mailbox.deliver(7, Ok(None));
        mailbox.interrupt();
        assert!(matches!(mailbox.wait(), Wake::Finished(Ok(None))));
    }

    #[test]
    fn test_wait_wakes_on_delivery_from_other_thread() {
        let mailbox = Arc::new(Mailbox::new());
        mailbox.expect(1);
        let remote = Arc::clone(&mailbox);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.deliver(1, Ok(Some(Vec::new())));
        });
        assert!(matches!(mailbox.wait(), Wake::Finished(Ok(Some(_)))));
        handle.join().unwrap();
    }
}
