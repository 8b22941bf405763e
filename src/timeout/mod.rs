//! Timeout-bounded match execution.
//!
//! A [`TimeoutEnforcer`] runs compiled matchers under a [`Deadline`]. With a
//! deadline set, the calling thread (the execution unit) registers itself in a
//! shared ledger, hands the match to its own executor thread and blocks on its
//! mailbox. A single monitor thread scans the ledger on a fixed cadence and
//! interrupts every unit whose deadline has passed, removing its entry in the
//! same critical section.
//!
//! An interrupted unit returns [`MatchOutcome::TimedOut`] immediately and
//! abandons its executor. The regex engine has no interruption hook, so the
//! abandoned evaluation keeps its CPU until it completes on its own; the
//! caller-observed bound is the deadline plus one monitor interval.
//!
//! An unbounded deadline bypasses the ledger and runs the match inline.
//!
//! # Examples
//!
//! ```rust
//! use grok_engine::{Deadline, MatchOutcome, PatternCompiler, PatternRegistry, TimeoutEnforcer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let registry = PatternRegistry::with_builtins();
//! let matcher = Arc::new(PatternCompiler::new(&registry).compile("%{INT:n:int}")?);
//!
//! let enforcer = TimeoutEnforcer::new(Duration::from_millis(500))
//!     .with_monitor_interval(Duration::from_millis(10));
//! enforcer.start()?;
//!
//! let outcome = enforcer.run(&matcher, "code 42", &enforcer.deadline());
//! assert!(outcome.is_matched());
//! # Ok::<(), grok_engine::GrokError>(())
//! ```

pub mod deadline;
pub(crate) mod executor;
pub(crate) mod ledger;

pub use deadline::{Deadline, TimeoutScope};

use crate::error::{GrokError, Result};
use crate::matcher::{CompiledMatcher, MatchOutcome};
use executor::{Job, MatchExecutor};
use ledger::{JobResult, Ledger, Mailbox, Wake};
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default cadence of the monitor's ledger scan.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(250);

/// Abandoned executor count from which every doubling is reported.
pub const ABANDONED_WARN_THRESHOLD: u64 = 8;

/// Per-thread execution unit state.
struct Unit {
    mailbox: Arc<Mailbox>,
    executor: Option<MatchExecutor>,
    next_job: u64,
}

thread_local! {
    static UNIT: RefCell<Option<Unit>> = const { RefCell::new(None) };
}

/// State shared with the monitor thread.
#[derive(Debug, Default)]
struct Shared {
    ledger: Ledger,
    running: Mutex<bool>,
    stop: Condvar,
    abandoned: AtomicU64,
}

impl Shared {
    fn running(&self) -> MutexGuard<'_, bool> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Enforces deadlines on match attempts.
///
/// One enforcer (and one monitor thread) exists per engine. It is shared by
/// all worker threads; each worker thread is a separate execution unit.
#[derive(Debug)]
pub struct TimeoutEnforcer {
    timeout: Option<Duration>,
    monitor_interval: Duration,
    shared: Arc<Shared>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl TimeoutEnforcer {
    /// Create an enforcer with the given per-unit budget. A zero timeout
    /// disables enforcement.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: (!timeout.is_zero()).then_some(timeout),
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            shared: Arc::new(Shared::default()),
            monitor: Mutex::new(None),
        }
    }

    /// An enforcer that never bounds a match.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Set the monitor scan cadence. Takes effect on the next [`start`](Self::start).
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout.is_some()
    }

    pub fn monitor_interval(&self) -> Duration {
        self.monitor_interval
    }

    /// A fresh deadline one timeout from now.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }

    /// Start the monitor thread. Does nothing when enforcement is disabled or
    /// the monitor is already running.
    pub fn start(&self) -> Result<()> {
        let Some(timeout) = self.timeout else {
            return Ok(());
        };

        let mut monitor = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if monitor.is_some() {
            return Ok(());
        }

        *self.shared.running() = true;
        let shared = Arc::clone(&self.shared);
        let interval = self.monitor_interval;
        let handle = thread::Builder::new()
            .name("grok-timeout-monitor".to_string())
            .spawn(move || monitor_loop(&shared, interval))
            .map_err(|e| {
                *self.shared.running() = false;
                GrokError::ExecutorUnavailable(e.to_string())
            })?;
        *monitor = Some(handle);

        info!(
            timeout_ms = timeout.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            "Grok timeout enforcer started"
        );
        Ok(())
    }

    /// Stop and join the monitor thread.
    pub fn stop(&self) {
        let handle = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        *self.shared.running() = false;
        self.shared.stop.notify_all();
        if handle.join().is_err() {
            error!("Grok timeout monitor thread panicked");
        }
        debug!("Grok timeout enforcer stopped");
    }

    pub fn is_running(&self) -> bool {
        *self.shared.running()
    }

    /// Number of units currently registered in the ledger.
    pub fn in_flight(&self) -> usize {
        self.shared.ledger.len()
    }

    /// Number of executors abandoned after an interrupt.
    pub fn abandoned_executions(&self) -> u64 {
        self.shared.abandoned.load(Ordering::Relaxed)
    }

    /// Run `matcher` against `text` under `deadline`.
    ///
    /// - An unbounded deadline, or a stopped monitor, runs the match inline.
    /// - An already expired deadline yields `TimedOut(0)` without running.
    /// - A runtime error in the regex engine is logged and yields `NotMatched`.
    pub fn run(&self, matcher: &Arc<CompiledMatcher>, text: &str, deadline: &Deadline) -> MatchOutcome {
        let Some(expires) = deadline.expires() else {
            return outcome(matcher, matcher.execute(text));
        };

        let started = Instant::now();
        if started >= expires {
            return MatchOutcome::TimedOut(Duration::ZERO);
        }

        if !self.is_running() {
            debug!(pattern = matcher.source(), "Grok timeout monitor not running, matching inline");
            return outcome(matcher, matcher.execute(text));
        }

        match self.run_bounded(matcher, text, expires) {
            Ok(Wake::Finished(result)) => outcome(matcher, result),
            Ok(Wake::Interrupted) => {
                let abandoned = self.shared.abandoned.fetch_add(1, Ordering::Relaxed) + 1;
                if should_report_abandoned(abandoned) {
                    warn!(
                        abandoned,
                        pattern = matcher.source(),
                        "Grok abandoned executors still hold threads until their matches finish"
                    );
                }
                MatchOutcome::TimedOut(started.elapsed())
            }
            Err(e) => {
                error!(pattern = matcher.source(), error = %e, "Grok match executor failed");
                MatchOutcome::NotMatched
            }
        }
    }

    fn run_bounded(&self, matcher: &Arc<CompiledMatcher>, text: &str, expires: Instant) -> Result<Wake> {
        let unit_id = thread::current().id();
        let ledger = &self.shared.ledger;

        let mailbox = UNIT.with(|cell| -> Result<Arc<Mailbox>> {
            let mut slot = cell.borrow_mut();
            let unit = slot.get_or_insert_with(|| Unit {
                mailbox: Arc::new(Mailbox::new()),
                executor: None,
                next_job: 0,
            });

            unit.next_job += 1;
            let job = unit.next_job;
            let mailbox = Arc::clone(&unit.mailbox);

            mailbox.clear_interrupt();
            mailbox.expect(job);

            let executor = match unit.executor.take() {
                Some(executor) => executor,
                None => MatchExecutor::spawn(executor_name())?,
            };

            ledger.register(unit_id, expires, Arc::clone(&mailbox));
            let submitted = executor.submit(Job {
                id: job,
                matcher: Arc::clone(matcher),
                text: text.to_string(),
                mailbox: Arc::clone(&mailbox),
            });
            if let Err(e) = submitted {
                if !ledger.deregister(unit_id) {
                    mailbox.clear_interrupt();
                }
                return Err(e);
            }

            unit.executor = Some(executor);
            Ok(mailbox)
        })?;

        let wake = mailbox.wait();
        if !ledger.deregister(unit_id) {
            mailbox.clear_interrupt();
        }

        if matches!(wake, Wake::Interrupted) {
            UNIT.with(|cell| {
                if let Some(unit) = cell.borrow_mut().as_mut() {
                    unit.executor = None;
                }
            });
        }
        Ok(wake)
    }
}

impl Drop for TimeoutEnforcer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn executor_name() -> String {
    match thread::current().name() {
        Some(name) => format!("grok-exec-{name}"),
        None => "grok-exec".to_string(),
    }
}

/// True at the threshold and at every doubling past it.
fn should_report_abandoned(abandoned: u64) -> bool {
    abandoned >= ABANDONED_WARN_THRESHOLD && abandoned.is_power_of_two()
}

fn outcome(matcher: &CompiledMatcher, result: JobResult) -> MatchOutcome {
    match result {
        Ok(Some(captures)) => MatchOutcome::Matched(captures),
        Ok(None) => MatchOutcome::NotMatched,
        Err(e) => {
            warn!(pattern = matcher.source(), error = %e, "Grok regexp runtime error");
            MatchOutcome::NotMatched
        }
    }
}

fn monitor_loop(shared: &Shared, interval: Duration) {
    let mut running = shared.running();
    while *running {
        running = shared
            .stop
            .wait_timeout(running, interval)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
        if !*running {
            break;
        }
        drop(running);

        match catch_unwind(AssertUnwindSafe(|| shared.ledger.expire(Instant::now()))) {
            Ok(0) => {}
            Ok(expired) => debug!(expired, "Grok timeout monitor interrupted matches"),
            Err(_) => error!("Grok timeout monitor scan failed"),
        }

        running = shared.running();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::PatternCompiler;
    use crate::patterns::PatternRegistry;

    fn matcher(pattern: &str) -> Arc<CompiledMatcher> {
        let registry = PatternRegistry::with_builtins();
        Arc::new(PatternCompiler::new(&registry).compile(pattern).unwrap())
    }

    fn enforcer(timeout_ms: u64) -> TimeoutEnforcer {
        let enforcer = TimeoutEnforcer::new(Duration::from_millis(timeout_ms))
            .with_monitor_interval(Duration::from_millis(10));
        enforcer.start().unwrap();
        enforcer
    }

    fn pathological() -> (Arc<CompiledMatcher>, String) {
        (matcher("(.*a){30}"), "a".repeat(70))
    }

    #[test]
    fn test_fast_match_under_deadline() {
        let enforcer = enforcer(1_000);
        let outcome = enforcer.run(&matcher("%{WORD:w}"), "hello", &enforcer.deadline());
        assert!(outcome.is_matched());
        assert_eq!(enforcer.in_flight(), 0);
    }

    #[test]
    fn test_pathological_match_times_out() {
        let enforcer = enforcer(100);
        let (matcher, text) = pathological();

        let started = Instant::now();
        let outcome = enforcer.run(&matcher, &text, &enforcer.deadline());
        assert!(outcome.is_timed_out(), "got {outcome:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(enforcer.abandoned_executions(), 1);
        assert_eq!(enforcer.in_flight(), 0);
    }

    #[test]
    fn test_no_signal_leakage_after_timeout() {
        let enforcer = enforcer(50);
        let (slow, text) = pathological();
        assert!(enforcer.run(&slow, &text, &enforcer.deadline()).is_timed_out());

        let fast = matcher("%{INT:n}");
        for _ in 0..20 {
            let outcome = enforcer.run(&fast, "42", &enforcer.deadline());
            assert!(outcome.is_matched(), "got {outcome:?}");
            let outcome = enforcer.run(&fast, "none", &enforcer.deadline());
            assert_eq!(outcome, MatchOutcome::NotMatched);
        }
    }

    #[test]
    fn test_expired_deadline_skips_execution() {
        let enforcer = enforcer(50);
        let deadline = Deadline::starting_at(
            Instant::now() - Duration::from_millis(100),
            Some(Duration::from_millis(50)),
        );
        let outcome = enforcer.run(&matcher("%{WORD:w}"), "hello", &deadline);
        assert_eq!(outcome, MatchOutcome::TimedOut(Duration::ZERO));
    }

    #[test]
    fn test_disabled_enforcer_runs_inline() {
        let enforcer = TimeoutEnforcer::disabled();
        enforcer.start().unwrap();
        assert!(!enforcer.is_running());
        assert!(enforcer.deadline().is_unbounded());

        let outcome = enforcer.run(&matcher("%{WORD:w}"), "hello", &enforcer.deadline());
        assert!(outcome.is_matched());
        assert_eq!(enforcer.in_flight(), 0);
    }

    #[test]
    fn test_stop_joins_monitor() {
        let enforcer = TimeoutEnforcer::new(Duration::from_secs(1));
        enforcer.start().unwrap();
        assert!(enforcer.is_running());

        let started = Instant::now();
        enforcer.stop();
        assert!(!enforcer.is_running());
        assert!(started.elapsed() < DEFAULT_MONITOR_INTERVAL * 2);
    }

    #[test]
    fn test_abandoned_report_points() {
        let reported: Vec<u64> = (1..=100).filter(|n| should_report_abandoned(*n)).collect();
        assert_eq!(reported, vec![8, 16, 32, 64]);
    }
}
