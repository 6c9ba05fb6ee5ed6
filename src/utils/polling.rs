/// Polling utilities for waiting on conditions with timeout
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// What a single poll tick observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<C> {
    /// The condition holds; polling stops
    Satisfied(C),
    /// Not there yet; keep the observation for the outcome
    Waiting(C),
}

/// Result of a bounded polling loop
///
/// A timeout is a normal, failed outcome. `last_observed` is whatever the
/// final successful tick saw, or `None` if every tick errored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome<C> {
    pub succeeded: bool,
    pub elapsed: Duration,
    pub last_observed: Option<C>,
}

/// Configuration for polling operations
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub timeout: Duration,
    pub interval: Duration,
    pub description: String,
}

impl PollingConfig {
    /// Create a new polling configuration
    pub fn new(timeout: Duration, interval: Duration, description: impl Into<String>) -> Self {
        Self {
            timeout,
            interval,
            description: description.into(),
        }
    }

    /// Poll until the probe reports `Satisfied` or the timeout elapses
    ///
    /// The first probe runs immediately. After each unsatisfied tick the loop
    /// gives up once `timeout` has elapsed, otherwise it sleeps `interval`.
    /// Probe errors are logged and treated as "not yet"; the loop never
    /// fails early.
    pub async fn observe<F, Fut, C>(&self, mut probe: F) -> PollOutcome<C>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Probe<C>>>,
    {
        info!("{}...", self.description);

        let start = Instant::now();
        let mut last_observed = None;

        loop {
            match probe().await {
                Ok(Probe::Satisfied(value)) => {
                    info!("✓ {}", self.description);
                    return PollOutcome {
                        succeeded: true,
                        elapsed: start.elapsed(),
                        last_observed: Some(value),
                    };
                }
                Ok(Probe::Waiting(value)) => {
                    last_observed = Some(value);
                }
                Err(e) => {
                    debug!("{}: probe failed: {:#}", self.description, e);
                }
            }

            if start.elapsed() >= self.timeout {
                return PollOutcome {
                    succeeded: false,
                    elapsed: start.elapsed(),
                    last_observed,
                };
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
