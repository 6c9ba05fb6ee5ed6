/// Sequencing of a full reset
///
/// Order is fixed: context guard, teardown (namespace reap, or cluster rebuild
/// in nuke mode), overlay apply, claim bind wait, pod readiness wait, backend
/// log probe, final pod table, then the dev tunnel or the status report.
/// Only the guard and teardown can abort; every later step degrades to a
/// warning and the run continues.
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::context::{ensure_context, Confirm};
use super::error::{ResetError, Result};
use super::probe::BackendHealthProbe;
use super::progress::ProgressReporter;
use super::provisioner::ClusterProvisioner;
use super::readiness::{ReadinessPoller, ReadyCounts};
use super::reaper::NamespaceReaper;
use super::tunnel::{PortForwardSession, Tunnel};
use super::volume::VolumeBindWaiter;
use super::ResetMode;
use crate::config::{Environment, EnvironmentConfig, LocalClusterConfig};
use crate::k8s::models::render_pod_table;
use crate::k8s::{ClusterApi, NamespaceState, PodObservation, VolumeClaimObservation};
use crate::kind::LocalCluster;
use crate::utils::PollOutcome;

/// What the manifest applier reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyStatus {
    Applied,
    Failed(String),
}

/// Everything observed during one reset
#[derive(Debug, Clone)]
pub struct ResetReport {
    pub environment: Environment,
    pub mode: ResetMode,
    pub namespace: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub teardown: PollOutcome<NamespaceState>,
    pub apply: ApplyStatus,
    pub volume: PollOutcome<VolumeClaimObservation>,
    pub readiness: PollOutcome<ReadyCounts>,
    pub backend: PollOutcome<u32>,
    pub final_pods: Vec<PodObservation>,
    /// Local URL of the dev tunnel, when one is opened
    pub forward_url: Option<String>,
}

impl ResetReport {
    /// True when any non-fatal step fell short
    pub fn is_degraded(&self) -> bool {
        self.apply != ApplyStatus::Applied
            || !self.volume.succeeded
            || !self.readiness.succeeded
            || !self.backend.succeeded
    }

    /// Pods in the final table that are neither ready nor completed
    pub fn pods_not_ready(&self) -> usize {
        self.final_pods
            .iter()
            .filter(|p| !p.is_completed() && !p.is_ready())
            .count()
    }

    pub fn log_summary(&self) {
        info!("");
        info!("Reset summary ({} / {} mode):", self.environment, self.mode);
        info!("  Namespace: {}", self.namespace);
        info!(
            "  Started: {}  Finished: {}",
            self.started_at.format("%H:%M:%S"),
            self.finished_at.format("%H:%M:%S")
        );
        info!("  Teardown: ok ({}s)", self.teardown.elapsed.as_secs());

        match &self.apply {
            ApplyStatus::Applied => info!("  Overlay: applied"),
            ApplyStatus::Failed(reason) => warn!("  Overlay: failed ({})", reason),
        }

        let claim = self
            .volume
            .last_observed
            .as_ref()
            .map(|c| c.phase.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if self.volume.succeeded {
            info!("  Storage claim: {} ({}s)", claim, self.volume.elapsed.as_secs());
        } else {
            warn!("  Storage claim: {} after {}s", claim, self.volume.elapsed.as_secs());
        }

        let counts = self.readiness.last_observed.unwrap_or_default();
        if self.readiness.succeeded {
            info!("  Pods ready: {} ({}s)", counts, self.readiness.elapsed.as_secs());
        } else {
            warn!(
                "  Pods ready: {} after {}s",
                counts,
                self.readiness.elapsed.as_secs()
            );
        }

        if self.backend.succeeded {
            info!("  Backend: ready");
        } else {
            warn!(
                "  Backend: marker not seen in {} attempt(s)",
                self.backend.last_observed.unwrap_or(0)
            );
        }

        match self.pods_not_ready() {
            0 => info!("  Final pods: {}", self.final_pods.len()),
            n => warn!("  Final pods: {} ({} not ready)", self.final_pods.len(), n),
        }

        if let Some(url) = &self.forward_url {
            info!("  Tunnel: {}", url);
        }

        if self.is_degraded() {
            warn!("Reset finished with warnings");
        } else {
            info!("✓ Reset completed successfully");
        }
    }
}

/// Drives one reset invocation against one environment
pub struct Orchestrator {
    environment: Environment,
    config: EnvironmentConfig,
    mode: ResetMode,
    cluster: Arc<dyn ClusterApi>,
    local: Arc<dyn LocalCluster>,
    tunnel: Arc<dyn Tunnel>,
    reporter: ProgressReporter,
    confirm: Option<Box<dyn Confirm>>,
}

impl Orchestrator {
    pub fn new(
        environment: Environment,
        config: EnvironmentConfig,
        mode: ResetMode,
        cluster: Arc<dyn ClusterApi>,
        local: Arc<dyn LocalCluster>,
        tunnel: Arc<dyn Tunnel>,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            environment,
            config,
            mode,
            cluster,
            local,
            tunnel,
            reporter,
            confirm: None,
        }
    }

    /// Offer to switch kubectl context instead of failing on a mismatch
    pub fn with_context_switch(mut self, confirm: Box<dyn Confirm>) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub async fn run(&self) -> Result<ResetReport> {
        let started_at = Local::now();
        let local_cluster = self.preflight()?;

        ensure_context(
            self.cluster.as_ref(),
            &self.config.context,
            self.confirm.as_deref(),
        )
        .await?;

        info!(
            "Resetting {} namespace {} ({} mode)",
            self.environment, self.config.namespace, self.mode
        );

        let teardown = match self.teardown(local_cluster).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Reset aborted: {}", e);
                self.dump_pods().await;
                return Err(e);
            }
        };

        let apply = self.apply().await;
        let volume = self.wait_for_claim().await;
        let readiness = self.wait_for_pods().await;
        let backend = self.confirm_backend().await;
        let final_pods = self.dump_pods().await;

        let report = ResetReport {
            environment: self.environment,
            mode: self.mode,
            namespace: self.config.namespace.clone(),
            started_at,
            finished_at: Local::now(),
            teardown,
            apply,
            volume,
            readiness,
            backend,
            final_pods,
            forward_url: self.forward().map(|(url, _)| url),
        };
        report.log_summary();

        self.hand_over().await;
        Ok(report)
    }

    /// Nuke mode needs a local cluster, which only dev has
    fn preflight(&self) -> Result<Option<&LocalClusterConfig>> {
        match self.mode {
            ResetMode::Quick => Ok(None),
            ResetMode::Nuke => match (&self.environment, &self.config.cluster) {
                (Environment::Dev, Some(cluster)) => Ok(Some(cluster)),
                _ => Err(ResetError::NukeUnsupported {
                    environment: self.environment.to_string(),
                }),
            },
        }
    }

    async fn teardown(
        &self,
        local_cluster: Option<&LocalClusterConfig>,
    ) -> Result<PollOutcome<NamespaceState>> {
        if let Some(cluster) = local_cluster {
            ClusterProvisioner::new(self.local.clone(), &self.reporter)
                .rebuild(cluster)
                .await?;
        }

        let timings = &self.config.timings;
        NamespaceReaper::new(
            self.cluster.as_ref(),
            timings.namespace_delete_timeout(),
            timings.namespace_delete_interval(),
        )
        .reap(&self.config.namespace, self.mode)
        .await
    }

    async fn apply(&self) -> ApplyStatus {
        match self.cluster.apply_overlay(&self.config.overlay).await {
            Ok(report) => {
                for line in report.lines().filter(|l| !l.trim().is_empty()) {
                    info!("  {}", line.trim());
                }
                info!("✓ Overlay {} applied", self.config.overlay.display());
                ApplyStatus::Applied
            }
            Err(e) => {
                warn!(
                    "Applying {} failed: {:#}; continuing to readiness checks",
                    self.config.overlay.display(),
                    e
                );
                ApplyStatus::Failed(format!("{:#}", e))
            }
        }
    }

    async fn wait_for_claim(&self) -> PollOutcome<VolumeClaimObservation> {
        let timings = &self.config.timings;
        let outcome = VolumeBindWaiter::new(
            self.cluster.as_ref(),
            timings.claim_bind_timeout(),
            timings.claim_bind_interval(),
        )
        .wait_bound(&self.config.volume_claim, &self.config.namespace)
        .await;

        if !outcome.succeeded {
            warn!(
                "Claim {} not bound after {}s; continuing",
                self.config.volume_claim,
                outcome.elapsed.as_secs()
            );
            match self
                .cluster
                .volume_claim(&self.config.namespace, &self.config.volume_claim)
                .await
            {
                Ok(claim) => warn!("  {}: {}", claim.name, claim.phase),
                Err(e) => warn!("  could not read claim status: {:#}", e),
            }
        }
        outcome
    }

    async fn wait_for_pods(&self) -> PollOutcome<ReadyCounts> {
        let timings = &self.config.timings;
        let outcome = ReadinessPoller::new(
            self.cluster.as_ref(),
            timings.pods_ready_timeout(),
            timings.pods_ready_interval(),
        )
        .wait_ready(&self.config.namespace)
        .await;

        if !outcome.succeeded {
            warn!(
                "Pods in {} not ready after {}s ({} ready); continuing",
                self.config.namespace,
                outcome.elapsed.as_secs(),
                outcome.last_observed.unwrap_or_default()
            );
            if let Ok(pods) = self.cluster.list_pods(&self.config.namespace).await {
                for line in render_pod_table(&pods) {
                    warn!("  {}", line);
                }
            }
        }
        outcome
    }

    async fn confirm_backend(&self) -> PollOutcome<u32> {
        let timings = &self.config.timings;
        let outcome = BackendHealthProbe::new(
            self.cluster.as_ref(),
            timings.probe_initial_delay(self.environment),
            timings.probe_attempts,
            timings.probe_interval(),
            timings.probe_tail_lines,
        )
        .confirm_ready(
            &self.config.namespace,
            &self.config.deployment,
            &self.config.ready_marker,
        )
        .await;

        if !outcome.succeeded {
            warn!(
                "Did not see \"{}\" in {} logs after {} attempts; the backend may still be starting",
                self.config.ready_marker, self.config.deployment, timings.probe_attempts
            );
        }
        outcome
    }

    /// Print the pod table; always runs before the process exits
    async fn dump_pods(&self) -> Vec<PodObservation> {
        match self.cluster.list_pods(&self.config.namespace).await {
            Ok(pods) => {
                info!("Pods in {}:", self.config.namespace);
                if pods.is_empty() {
                    info!("  (none)");
                } else {
                    for line in render_pod_table(&pods) {
                        info!("  {}", line);
                    }
                }
                pods
            }
            Err(e) => {
                warn!("Could not list pods in {}: {:#}", self.config.namespace, e);
                Vec::new()
            }
        }
    }

    fn forward(&self) -> Option<(String, PortForwardSession<'_>)> {
        let forward = self
            .config
            .port_forward
            .as_ref()
            .filter(|_| self.environment == Environment::Dev)?;
        let session =
            PortForwardSession::new(self.tunnel.as_ref(), &self.config.namespace, forward);
        Some((session.local_url(), session))
    }

    /// Dev ends in a tunnel; other environments end with the report
    async fn hand_over(&self) {
        let Some((url, session)) = self.forward() else {
            return;
        };
        if let Err(e) = session.open().await {
            warn!("Port-forward on {} ended: {:#}", url, e);
        }
    }
}
