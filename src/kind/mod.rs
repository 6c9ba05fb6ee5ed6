/// Local kind cluster lifecycle and control-node access
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::k8s::DeleteOutcome;
use crate::utils::command::{check_tool_installed, CommandBuilder};

/// Operations on a disposable local cluster
#[async_trait]
pub trait LocalCluster: Send + Sync {
    /// Delete the named cluster; a cluster that does not exist is `NotFound`
    async fn delete_cluster(&self, name: &str) -> Result<DeleteOutcome>;

    async fn create_cluster(&self, name: &str) -> Result<()>;

    /// Create `dir` on the cluster node container
    async fn prepare_dir(&self, node: &str, dir: &str) -> Result<()>;

    /// Copy a host file into `dir` on the node container
    async fn copy_to_node(&self, source: &Path, node: &str, dir: &str) -> Result<()>;
}

/// kind + docker implementation
#[derive(Debug, Clone, Default)]
pub struct KindCluster;

impl KindCluster {
    pub fn new() -> Self {
        Self
    }

    /// Check that kind and docker are installed
    pub async fn check_tools_installed() -> Result<()> {
        check_tool_installed(
            "kind",
            &["version"],
            "https://kind.sigs.k8s.io/docs/user/quick-start/#installation",
        )
        .await?;
        check_tool_installed(
            "docker",
            &["version", "--format", "{{.Client.Version}}"],
            "https://docs.docker.com/get-docker/",
        )
        .await
    }

    async fn cluster_exists(&self, name: &str) -> Result<bool> {
        let stdout = CommandBuilder::new("kind")
            .args(["get", "clusters"])
            .context("Failed to list kind clusters")
            .run()
            .await?;
        Ok(stdout.lines().any(|line| line.trim() == name))
    }
}

/// Destination path of `source` inside `dir` on the node
fn node_destination(source: &Path, node: &str, dir: &str) -> Result<String> {
    let file_name = source
        .file_name()
        .context("Seed dataset path has no file name")?
        .to_string_lossy();
    Ok(format!("{}:{}/{}", node, dir.trim_end_matches('/'), file_name))
}

#[async_trait]
impl LocalCluster for KindCluster {
    async fn delete_cluster(&self, name: &str) -> Result<DeleteOutcome> {
        if !self.cluster_exists(name).await? {
            return Ok(DeleteOutcome::NotFound);
        }

        info!("Deleting kind cluster: {}", name);
        let output = CommandBuilder::new("kind")
            .args(["delete", "cluster", "--name", name])
            .context("Failed to delete kind cluster")
            .output()
            .await?;

        if output.is_not_found() {
            return Ok(DeleteOutcome::NotFound);
        }
        output.into_result()?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn create_cluster(&self, name: &str) -> Result<()> {
        info!("Creating kind cluster: {}", name);
        CommandBuilder::new("kind")
            .args(["create", "cluster", "--name", name])
            .context("Failed to create kind cluster")
            .run_silent()
            .await
    }

    async fn prepare_dir(&self, node: &str, dir: &str) -> Result<()> {
        CommandBuilder::new("docker")
            .args(["exec", node, "mkdir", "-p", dir])
            .context("Failed to create directory on cluster node")
            .run_silent()
            .await
    }

    async fn copy_to_node(&self, source: &Path, node: &str, dir: &str) -> Result<()> {
        let destination = node_destination(source, node, dir)?;
        info!("Copying {} to {}", source.display(), destination);
        CommandBuilder::new("docker")
            .arg("cp")
            .arg(source)
            .arg(&destination)
            .context("Failed to copy seed dataset to cluster node")
            .run_silent()
            .await
    }
}
