/// Local cluster rebuild for nuke mode
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ResetError, Result};
use super::progress::ProgressReporter;
use crate::config::LocalClusterConfig;
use crate::k8s::DeleteOutcome;
use crate::kind::LocalCluster;

/// Destroys and recreates the local cluster, then stages the seed dataset
pub struct ClusterProvisioner<'a> {
    local: Arc<dyn LocalCluster>,
    reporter: &'a ProgressReporter,
}

impl<'a> ClusterProvisioner<'a> {
    pub fn new(local: Arc<dyn LocalCluster>, reporter: &'a ProgressReporter) -> Self {
        Self { local, reporter }
    }

    /// Delete (best effort), create, then seed the control node
    pub async fn rebuild(&self, cluster: &LocalClusterConfig) -> Result<()> {
        let name = cluster.name.clone();

        let local = self.local.clone();
        let target = name.clone();
        let deleted = self
            .reporter
            .track(format!("Deleting cluster {}", name), async move {
                local.delete_cluster(&target).await
            })
            .await;
        match deleted {
            Ok(DeleteOutcome::Deleted) => info!("Cluster {} deleted", name),
            Ok(DeleteOutcome::NotFound) => {
                warn!("Cluster {} not found, continuing", name)
            }
            Err(e) => warn!("Failed to delete cluster {}: {:#}, continuing", name, e),
        }

        let local = self.local.clone();
        let target = name.clone();
        self.reporter
            .track(format!("Creating cluster {}", name), async move {
                local.create_cluster(&target).await
            })
            .await
            .map_err(|e| ResetError::ClusterCreate {
                name: name.clone(),
                reason: format!("{:#}", e),
            })?;

        let node = cluster.control_node();
        self.local.prepare_dir(&node, &cluster.seed_dir).await?;
        info!("Seed directory {} ready on {}", cluster.seed_dir, node);

        let present = tokio::fs::try_exists(&cluster.seed_dataset)
            .await
            .unwrap_or(false);
        if !present {
            return Err(ResetError::SeedDatasetMissing {
                path: cluster.seed_dataset.clone(),
            });
        }
        self.local
            .copy_to_node(&cluster.seed_dataset, &node, &cluster.seed_dir)
            .await?;

        info!("✓ Cluster {} rebuilt and seeded", name);
        Ok(())
    }
}
