/// kubectl-backed implementation of the cluster operations
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, PersistentVolumeClaim, Pod};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::api::ClusterApi;
use super::models::{
    ClaimPhase, DeleteOutcome, NamespaceState, PodObservation, VolumeClaimObservation,
};
use crate::utils::command::{check_tool_installed, CommandBuilder};

/// `kubectl get <kind> -o json` list envelope
#[derive(Deserialize)]
struct ItemList<T> {
    #[serde(default)]
    items: Vec<T>,
}

/// Kubernetes client for kubectl operations
#[derive(Debug, Clone, Default)]
pub struct KubectlClient;

impl KubectlClient {
    pub fn new() -> Self {
        Self
    }

    /// Check if kubectl is installed
    pub async fn check_kubectl_installed() -> Result<()> {
        check_tool_installed(
            "kubectl",
            &["version", "--client"],
            "https://kubernetes.io/docs/tasks/tools/",
        )
        .await
    }

    fn kubectl() -> CommandBuilder {
        CommandBuilder::new("kubectl")
    }
}

fn decode<T: DeserializeOwned>(json: &str, what: &str) -> Result<T> {
    serde_json::from_str(json).with_context(|| format!("Failed to decode {} from kubectl", what))
}

/// Decode a pod list into observations
pub fn parse_pod_list(json: &str) -> Result<Vec<PodObservation>> {
    let list: ItemList<Pod> = decode(json, "pod list")?;
    Ok(list.items.iter().map(PodObservation::from_pod).collect())
}

#[async_trait]
impl ClusterApi for KubectlClient {
    async fn current_context(&self) -> Result<String> {
        let stdout = Self::kubectl()
            .args(["config", "current-context"])
            .context("Failed to read current kubectl context")
            .run()
            .await?;
        Ok(stdout.trim().to_string())
    }

    async fn use_context(&self, context: &str) -> Result<()> {
        info!("Switching kubectl context to {}", context);
        Self::kubectl()
            .args(["config", "use-context", context])
            .context("Failed to switch kubectl context")
            .run_silent()
            .await
    }

    async fn namespace_state(&self, namespace: &str) -> Result<NamespaceState> {
        let output = Self::kubectl()
            .args(["get", "namespace", namespace, "-o", "json"])
            .context("Failed to get namespace")
            .output()
            .await?;

        if output.is_not_found() {
            return Ok(NamespaceState::Absent);
        }
        let stdout = output.into_result()?;
        let ns: Namespace = decode(&stdout, "namespace")?;
        Ok(NamespaceState::from_namespace(&ns))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<DeleteOutcome> {
        info!("Deleting namespace: {}", namespace);

        let output = Self::kubectl()
            .args(["delete", "namespace", namespace, "--wait=false"])
            .context("Failed to delete namespace")
            .output()
            .await?;

        if output.is_not_found() {
            info!("Namespace {} not found (already removed)", namespace);
            return Ok(DeleteOutcome::NotFound);
        }
        output
            .into_result()
            .with_context(|| format!("Failed to delete namespace {}", namespace))?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn create_namespace(&self, namespace: &str) -> Result<()> {
        Self::kubectl()
            .args(["create", "namespace", namespace])
            .context("Failed to create namespace")
            .run_silent()
            .await
            .with_context(|| format!("Failed to create namespace {}", namespace))
    }

    async fn apply_overlay(&self, overlay: &Path) -> Result<String> {
        info!("Applying overlay: {}", overlay.display());

        Self::kubectl()
            .arg("apply")
            .arg("-k")
            .arg(overlay)
            .context("Failed to apply overlay")
            .run()
            .await
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodObservation>> {
        let stdout = Self::kubectl()
            .args(["get", "pods", "-n", namespace, "-o", "json"])
            .context("Failed to list pods")
            .run()
            .await?;
        parse_pod_list(&stdout)
    }

    async fn volume_claim(&self, namespace: &str, claim: &str) -> Result<VolumeClaimObservation> {
        let output = Self::kubectl()
            .args(["get", "pvc", claim, "-n", namespace, "-o", "json"])
            .context("Failed to get persistent volume claim")
            .output()
            .await?;

        if output.is_not_found() {
            debug!("Claim {} does not exist yet", claim);
            return Ok(VolumeClaimObservation::new(claim, ClaimPhase::Unknown));
        }
        let stdout = output.into_result()?;
        let pvc: PersistentVolumeClaim = decode(&stdout, "persistent volume claim")?;
        Ok(VolumeClaimObservation::from_claim(&pvc))
    }

    async fn tail_logs(&self, namespace: &str, deployment: &str, lines: u32) -> Result<String> {
        Self::kubectl()
            .args([
                "logs".to_string(),
                format!("deployment/{}", deployment),
                "-n".to_string(),
                namespace.to_string(),
                format!("--tail={}", lines),
            ])
            .context("Failed to read deployment logs")
            .run()
            .await
    }
}
