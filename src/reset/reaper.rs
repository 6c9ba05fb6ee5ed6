/// Namespace teardown and recreation
use std::time::Duration;
use tracing::{debug, info};

use super::error::{ResetError, Result};
use super::ResetMode;
use crate::k8s::{ClusterApi, DeleteOutcome, NamespaceState};
use crate::utils::{PollOutcome, PollingConfig, Probe};

/// Deletes the target namespace, waits for it to vanish and recreates it
pub struct NamespaceReaper<'a> {
    cluster: &'a dyn ClusterApi,
    timeout: Duration,
    interval: Duration,
}

impl<'a> NamespaceReaper<'a> {
    pub fn new(cluster: &'a dyn ClusterApi, timeout: Duration, interval: Duration) -> Self {
        Self {
            cluster,
            timeout,
            interval,
        }
    }

    /// Leave `namespace` freshly created and empty
    ///
    /// In nuke mode the cluster rebuild already removed the namespace, so only
    /// the create step runs. A namespace stuck in Terminating past the timeout
    /// is fatal.
    pub async fn reap(
        &self,
        namespace: &str,
        mode: ResetMode,
    ) -> Result<PollOutcome<NamespaceState>> {
        if mode == ResetMode::Nuke {
            self.recreate(namespace).await?;
            return Ok(PollOutcome {
                succeeded: true,
                elapsed: Duration::ZERO,
                last_observed: Some(NamespaceState::Absent),
            });
        }

        match self.cluster.delete_namespace(namespace).await? {
            DeleteOutcome::Deleted => info!("Delete requested for namespace {}", namespace),
            DeleteOutcome::NotFound => info!("Namespace {} does not exist", namespace),
        }

        let cluster = self.cluster;
        let outcome = PollingConfig::new(
            self.timeout,
            self.interval,
            format!("Waiting for namespace {} to be removed", namespace),
        )
        .observe(|| async move {
            let state = cluster.namespace_state(namespace).await?;
            debug!("Namespace {}: {}", namespace, state);
            Ok(match state {
                NamespaceState::Absent => Probe::Satisfied(state),
                _ => Probe::Waiting(state),
            })
        })
        .await;

        if !outcome.succeeded {
            return Err(ResetError::NamespaceDeletionTimeout {
                namespace: namespace.to_string(),
                timeout: self.timeout,
            });
        }

        self.recreate(namespace).await?;
        Ok(outcome)
    }

    pub async fn recreate(&self, namespace: &str) -> Result<()> {
        self.cluster.create_namespace(namespace).await?;
        info!("✓ Namespace {} created", namespace);
        Ok(())
    }
}
