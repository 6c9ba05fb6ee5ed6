/// Backend startup confirmation from application logs
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::k8s::ClusterApi;
use crate::utils::PollOutcome;

/// Looks for a readiness marker in a deployment's recent logs
///
/// Advisory only: the outcome never stops the reset.
pub struct BackendHealthProbe<'a> {
    cluster: &'a dyn ClusterApi,
    initial_delay: Duration,
    max_attempts: u32,
    attempt_interval: Duration,
    tail_lines: u32,
}

impl<'a> BackendHealthProbe<'a> {
    pub fn new(
        cluster: &'a dyn ClusterApi,
        initial_delay: Duration,
        max_attempts: u32,
        attempt_interval: Duration,
        tail_lines: u32,
    ) -> Self {
        Self {
            cluster,
            initial_delay,
            max_attempts,
            attempt_interval,
            tail_lines,
        }
    }

    /// Outcome carries the number of attempts made
    pub async fn confirm_ready(
        &self,
        namespace: &str,
        deployment: &str,
        marker: &str,
    ) -> PollOutcome<u32> {
        let start = Instant::now();
        info!(
            "Waiting {}s before checking {} logs for \"{}\"",
            self.initial_delay.as_secs(),
            deployment,
            marker
        );
        tokio::time::sleep(self.initial_delay).await;

        for attempt in 1..=self.max_attempts {
            match self
                .cluster
                .tail_logs(namespace, deployment, self.tail_lines)
                .await
            {
                Ok(logs) if logs.contains(marker) => {
                    info!("✓ Backend {} reported ready (attempt {})", deployment, attempt);
                    return PollOutcome {
                        succeeded: true,
                        elapsed: start.elapsed(),
                        last_observed: Some(attempt),
                    };
                }
                Ok(_) => debug!(
                    "Marker not in {} logs yet ({}/{})",
                    deployment, attempt, self.max_attempts
                ),
                Err(e) => debug!("Could not read {} logs: {:#}", deployment, e),
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.attempt_interval).await;
            }
        }

        PollOutcome {
            succeeded: false,
            elapsed: start.elapsed(),
            last_observed: Some(self.max_attempts),
        }
    }
}
