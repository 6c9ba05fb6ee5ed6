/// Cluster operations the reset flow depends on
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use super::models::{DeleteOutcome, NamespaceState, PodObservation, VolumeClaimObservation};

/// Structured access to the target cluster
///
/// `apply_overlay` is the manifest applier: idempotent, and the caller decides
/// whether its failure matters.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Name of the active kubeconfig context
    async fn current_context(&self) -> Result<String>;

    /// Switch the active kubeconfig context
    async fn use_context(&self, context: &str) -> Result<()>;

    async fn namespace_state(&self, namespace: &str) -> Result<NamespaceState>;

    /// Request namespace deletion without waiting for it
    async fn delete_namespace(&self, namespace: &str) -> Result<DeleteOutcome>;

    async fn create_namespace(&self, namespace: &str) -> Result<()>;

    /// Apply a declarative overlay, returning the applier's report
    async fn apply_overlay(&self, overlay: &Path) -> Result<String>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodObservation>>;

    /// Phase of a storage claim; a claim that does not exist yet is `Unknown`
    async fn volume_claim(&self, namespace: &str, claim: &str) -> Result<VolumeClaimObservation>;

    /// Most recent `lines` log lines of a deployment
    async fn tail_logs(&self, namespace: &str, deployment: &str, lines: u32) -> Result<String>;
}
