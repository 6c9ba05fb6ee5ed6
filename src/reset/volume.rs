/// Storage claim bind waiting
use std::time::Duration;
use tracing::debug;

use crate::k8s::{ClaimPhase, ClusterApi, VolumeClaimObservation};
use crate::utils::{PollOutcome, PollingConfig, Probe};

/// Polls a storage claim until it is Bound
pub struct VolumeBindWaiter<'a> {
    cluster: &'a dyn ClusterApi,
    timeout: Duration,
    interval: Duration,
}

impl<'a> VolumeBindWaiter<'a> {
    pub fn new(cluster: &'a dyn ClusterApi, timeout: Duration, interval: Duration) -> Self {
        Self {
            cluster,
            timeout,
            interval,
        }
    }

    /// Succeeds on the first tick that sees Bound; a timeout is a failed outcome
    pub async fn wait_bound(
        &self,
        claim: &str,
        namespace: &str,
    ) -> PollOutcome<VolumeClaimObservation> {
        let cluster = self.cluster;
        PollingConfig::new(
            self.timeout,
            self.interval,
            format!("Waiting for claim {} to bind", claim),
        )
        .observe(|| async move {
            let observed = cluster.volume_claim(namespace, claim).await?;
            debug!("Claim {}: {}", claim, observed.phase);
            Ok(if observed.phase == ClaimPhase::Bound {
                Probe::Satisfied(observed)
            } else {
                Probe::Waiting(observed)
            })
        })
        .await
    }
}
