/// Fatal reset failures
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures that abort the whole reset and exit non-zero
///
/// Everything else (apply failure, unbound claim, unready pods, missing
/// backend marker) is reported as a degraded outcome instead.
#[derive(Error, Debug)]
pub enum ResetError {
    #[error("active cluster context is '{actual}', expected '{expected}'")]
    ContextMismatch { expected: String, actual: String },

    #[error("namespace {namespace} was not removed within {}s", .timeout.as_secs())]
    NamespaceDeletionTimeout {
        namespace: String,
        timeout: Duration,
    },

    #[error("failed to create cluster {name}: {reason}")]
    ClusterCreate { name: String, reason: String },

    #[error("seed dataset not found: {}", .path.display())]
    SeedDatasetMissing { path: PathBuf },

    #[error("nuke mode needs a local cluster section in the {environment} configuration")]
    NukeUnsupported { environment: String },

    #[error(transparent)]
    Cluster(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ResetError>;
