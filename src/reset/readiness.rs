/// Pod readiness polling
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::k8s::{ClusterApi, PodObservation};
use crate::utils::{PollOutcome, PollingConfig, Probe};

/// Ready/total over the pods that are expected to keep running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyCounts {
    pub ready: usize,
    pub total: usize,
}

impl ReadyCounts {
    /// Completed pods are left out entirely
    pub fn from_pods(pods: &[PodObservation]) -> Self {
        let running: Vec<_> = pods.iter().filter(|p| !p.is_completed()).collect();
        Self {
            ready: running.iter().filter(|p| p.is_ready()).count(),
            total: running.len(),
        }
    }

    /// An empty namespace is not ready: nothing has been scheduled yet
    pub fn all_ready(&self) -> bool {
        self.total > 0 && self.ready == self.total
    }
}

impl fmt::Display for ReadyCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ready, self.total)
    }
}

/// Polls the namespace until every long-running pod is ready
pub struct ReadinessPoller<'a> {
    cluster: &'a dyn ClusterApi,
    timeout: Duration,
    interval: Duration,
}

impl<'a> ReadinessPoller<'a> {
    pub fn new(cluster: &'a dyn ClusterApi, timeout: Duration, interval: Duration) -> Self {
        Self {
            cluster,
            timeout,
            interval,
        }
    }

    pub async fn wait_ready(&self, namespace: &str) -> PollOutcome<ReadyCounts> {
        let cluster = self.cluster;
        PollingConfig::new(
            self.timeout,
            self.interval,
            format!("Waiting for pods in {} to become ready", namespace),
        )
        .observe(|| async move {
            let pods = cluster.list_pods(namespace).await?;
            let counts = ReadyCounts::from_pods(&pods);
            info!("Pods ready: {}", counts);
            Ok(if counts.all_ready() {
                Probe::Satisfied(counts)
            } else {
                Probe::Waiting(counts)
            })
        })
        .await
    }
}
