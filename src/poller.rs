//! Bounded polling of asynchronous provider jobs.
//!
//! A job moves `Submitted -> {Pending}* -> Completed | Failed | TimedOut`.
//! The poller owns that loop for every queue-based provider; waiting between
//! checks goes through a [`Sleeper`] so tests can run without real delays.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GenerationError;

/// Outcome of a single status check.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    /// Job is still queued or running.
    Pending,
    /// Job finished; carries whatever the provider returned.
    Done(T),
    /// Job reported a failure with this reason.
    Failed(String),
}

/// Where a poll loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Pending { attempt: u32 },
    Completed { attempts: u32 },
    Failed { attempts: u32 },
    TimedOut { attempts: u32 },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Completed { .. } | PollState::Failed { .. } | PollState::TimedOut { .. }
        )
    }
}

/// Interval between checks and the number of checks allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Suspends a poll loop between checks.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and records every requested delay.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|delays| delays.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

/// Runs the bounded status-check loop for one job.
pub struct Poller {
    policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Poller {
    pub fn new(policy: PollPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Call `check` until it reports done or failed, or the budget runs out.
    ///
    /// `check` receives the 1-based attempt number. A transport error from
    /// `check` ends the loop immediately. No sleep follows the final attempt.
    pub async fn poll_until_done<T, F, Fut>(&self, mut check: F) -> Result<T, GenerationError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<PollStatus<T>, GenerationError>>,
    {
        let mut state = PollState::Submitted;
        log::debug!("Polling started: {:?} ({:?})", state, self.policy);

        for attempt in 1..=self.policy.max_attempts {
            state = PollState::Pending { attempt };

            match check(attempt).await? {
                PollStatus::Done(value) => {
                    state = PollState::Completed { attempts: attempt };
                    log::info!("Job finished: {:?}", state);
                    return Ok(value);
                }
                PollStatus::Failed(reason) => {
                    state = PollState::Failed { attempts: attempt };
                    log::error!("Job finished: {:?}, reason: {}", state, reason);
                    return Err(GenerationError::from_job_failure(&reason));
                }
                PollStatus::Pending => {
                    log::debug!(
                        "Status check {}/{}: pending",
                        attempt,
                        self.policy.max_attempts
                    );
                    if attempt < self.policy.max_attempts {
                        self.sleeper.sleep(self.policy.interval).await;
                    }
                }
            }
        }

        let attempts = match state {
            PollState::Pending { attempt } => attempt,
            _ => 0,
        };
        state = PollState::TimedOut { attempts };
        log::error!("Job still pending, giving up: {:?}", state);
        Err(GenerationError::Timeout { attempts })
    }
}
