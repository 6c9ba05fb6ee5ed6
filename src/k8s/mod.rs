/// Kubernetes cluster access
pub mod api;
pub mod client;
pub mod models;

pub use api::ClusterApi;
pub use client::KubectlClient;
pub use models::{
    ClaimPhase, DeleteOutcome, NamespaceState, PodObservation, VolumeClaimObservation,
};
