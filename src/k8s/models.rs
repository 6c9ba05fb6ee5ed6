/// Typed observations of cluster objects
///
/// kubectl JSON is decoded into `k8s-openapi` types and reduced to the small
/// snapshots the reset flow reasons about.
use k8s_openapi::api::core::v1::{Namespace, PersistentVolumeClaim, Pod};
use std::fmt;

/// Lifecycle of the target namespace as seen by polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceState {
    Exists,
    /// Still retrievable but carries a deletion marker
    Terminating,
    Absent,
}

impl NamespaceState {
    pub fn from_namespace(ns: &Namespace) -> Self {
        let phase_terminating = ns
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .is_some_and(|p| p == "Terminating");

        if ns.metadata.deletion_timestamp.is_some() || phase_terminating {
            NamespaceState::Terminating
        } else {
            NamespaceState::Exists
        }
    }
}

impl fmt::Display for NamespaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceState::Exists => write!(f, "Exists"),
            NamespaceState::Terminating => write!(f, "Terminating"),
            NamespaceState::Absent => write!(f, "Absent"),
        }
    }
}

/// Outcome of a delete request; a missing target is not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Pod phase as an operator reads it in `kubectl get pods`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    /// Finished one-shot work; excluded from readiness
    Completed,
    Failed,
    Unknown,
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Completed => "Completed",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of one pod, recomputed on every poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodObservation {
    pub name: String,
    pub ready_containers: u32,
    pub total_containers: u32,
    pub phase: PodPhase,
    /// Waiting/terminated reason of the first unhappy container, if any
    pub reason: Option<String>,
}

impl PodObservation {
    pub fn new(name: impl Into<String>, ready: u32, total: u32, phase: PodPhase) -> Self {
        Self {
            name: name.into(),
            ready_containers: ready,
            total_containers: total,
            phase,
            reason: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready_containers == self.total_containers
    }

    pub fn is_completed(&self) -> bool {
        self.phase == PodPhase::Completed
    }

    pub fn from_pod(pod: &Pod) -> Self {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let status = pod.status.as_ref();
        let statuses = status
            .and_then(|s| s.container_statuses.as_deref())
            .unwrap_or_default();

        let declared = pod.spec.as_ref().map(|s| s.containers.len()).unwrap_or(0);
        let total = declared.max(statuses.len()) as u32;
        let ready = statuses.iter().filter(|c| c.ready).count() as u32;

        let all_exited_cleanly = !statuses.is_empty()
            && statuses.iter().all(|c| {
                c.state
                    .as_ref()
                    .and_then(|s| s.terminated.as_ref())
                    .is_some_and(|t| t.exit_code == 0)
            });

        let phase = match status.and_then(|s| s.phase.as_deref()) {
            Some("Succeeded") => PodPhase::Completed,
            _ if all_exited_cleanly => PodPhase::Completed,
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        };

        let reason = statuses.iter().find_map(|c| {
            let state = c.state.as_ref()?;
            if let Some(waiting) = &state.waiting {
                return waiting.reason.clone();
            }
            match &state.terminated {
                Some(t) if t.exit_code != 0 => t.reason.clone(),
                _ => None,
            }
        });

        Self {
            reason,
            ..Self::new(name, ready, total, phase)
        }
    }

    /// READY column, e.g. `1/2`
    pub fn ready_column(&self) -> String {
        format!("{}/{}", self.ready_containers, self.total_containers)
    }

    /// STATUS column: the container reason wins over the phase
    pub fn status_column(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| self.phase.to_string())
    }
}

/// Storage claim binding phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimPhase {
    Unknown,
    Pending,
    Bound,
    Lost,
}

impl fmt::Display for ClaimPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClaimPhase::Unknown => "Unknown",
            ClaimPhase::Pending => "Pending",
            ClaimPhase::Bound => "Bound",
            ClaimPhase::Lost => "Lost",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeClaimObservation {
    pub name: String,
    pub phase: ClaimPhase,
}

impl VolumeClaimObservation {
    pub fn new(name: impl Into<String>, phase: ClaimPhase) -> Self {
        Self {
            name: name.into(),
            phase,
        }
    }

    pub fn from_claim(claim: &PersistentVolumeClaim) -> Self {
        let phase = match claim.status.as_ref().and_then(|s| s.phase.as_deref()) {
            Some("Pending") => ClaimPhase::Pending,
            Some("Bound") => ClaimPhase::Bound,
            Some("Lost") => ClaimPhase::Lost,
            _ => ClaimPhase::Unknown,
        };
        Self {
            name: claim.metadata.name.clone().unwrap_or_default(),
            phase,
        }
    }
}

/// Render pods the way `kubectl get pods` lays them out
pub fn render_pod_table(pods: &[PodObservation]) -> Vec<String> {
    let name_width = pods
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut lines = vec![format!("{:<name_width$}   {:<7}   STATUS", "NAME", "READY")];
    for pod in pods {
        lines.push(format!(
            "{:<name_width$}   {:<7}   {}",
            pod.name,
            pod.ready_column(),
            pod.status_column()
        ));
    }
    lines
}
