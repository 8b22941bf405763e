//! Dedicated match executor threads.
//!
//! The regex engine cannot be interrupted mid-evaluation, so a bounded match
//! runs on an executor thread owned by the calling worker. The worker waits on
//! its mailbox and may walk away from a runaway evaluation; the abandoned
//! executor finishes the job on its own, its result is discarded, and the
//! thread exits once its job queue is closed.

use super::ledger::Mailbox;
use crate::error::{GrokError, Result};
use crate::matcher::CompiledMatcher;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tracing::debug;

pub(crate) struct Job {
    pub id: u64,
    pub matcher: Arc<CompiledMatcher>,
    pub text: String,
    pub mailbox: Arc<Mailbox>,
}

/// Handle to one executor thread.
pub(crate) struct MatchExecutor {
    jobs: Sender<Job>,
}

impl MatchExecutor {
    pub fn spawn(name: String) -> Result<Self> {
        let (jobs, queue) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name(name)
            .spawn(move || {
                while let Ok(job) = queue.recv() {
                    let result = job.matcher.execute(&job.text);
                    job.mailbox.deliver(job.id, result);
                }
                debug!("Grok match executor exiting");
            })
            .map_err(|e| GrokError::ExecutorUnavailable(e.to_string()))?;
        Ok(Self { jobs })
    }

    /// Queue `job`. Fails if the executor thread is gone.
    pub fn submit(&self, job: Job) -> Result<()> {
        self.jobs
            .send(job)
            .map_err(|_| GrokError::ExecutorUnavailable("executor thread terminated".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::PatternCompiler;
    use crate::patterns::PatternRegistry;
    use crate::timeout::ledger::Wake;

    #[test]
    fn test_executor_delivers_result() {
        let registry = PatternRegistry::with_builtins();
        let matcher = Arc::new(PatternCompiler::new(&registry).compile("%{WORD:w}").unwrap());
        let mailbox = Arc::new(Mailbox::new());
        let executor = MatchExecutor::spawn("grok-test-executor".to_string()).unwrap();

        mailbox.expect(1);
        executor
            .submit(Job {
                id: 1,
                matcher,
                text: "hello".to_string(),
                mailbox: Arc::clone(&mailbox),
            })
            .unwrap();

        match mailbox.wait() {
            Wake::Finished(Ok(Some(captures))) => assert_eq!(captures[0].field, "w"),
            other => panic!("unexpected wake: {other:?}"),
        }
    }
}
