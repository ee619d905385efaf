//! # Bounded Polling Policy
//!
//! Negotiation and transfer both follow the same shape: submit a request,
//! then poll a status endpoint at a fixed interval up to a bounded attempt
//! count. This module expresses that as a reusable policy value instead of
//! inlined sleep loops.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use broker_shared::config::PollingConfig;

/// Why a polling run ended without a value
#[derive(Debug)]
pub enum PollError<E> {
    /// The attempt ceiling was reached without the terminal state
    Exhausted { attempts: u32 },
    /// A poll failed hard; no further attempts are made at this layer
    Failed(E),
}

/// Fixed-interval, bounded-attempt polling policy
#[derive(Debug, Clone, Copy)]
pub struct PollingPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollingPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(config.interval(), config.max_attempts)
    }

    /// Drive `poll` until it yields a value, fails, or exhausts the ceiling.
    ///
    /// `poll` receives the 1-based attempt number and returns `Ok(Some(_))`
    /// on reaching the terminal state, `Ok(None)` to keep waiting, or
    /// `Err(_)` to abort immediately. Exactly `max_attempts` polls are
    /// performed in the worst case, with no sleep after the final one.
    pub async fn run<T, E, F, Fut>(&self, mut poll: F) -> Result<T, PollError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        for attempt in 1..=self.max_attempts {
            match poll(attempt).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {
                    debug!(attempt, max_attempts = self.max_attempts, "Not yet terminal");
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.interval).await;
                    }
                }
                Err(e) => return Err(PollError::Failed(e)),
            }
        }

        Err(PollError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}
