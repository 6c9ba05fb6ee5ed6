/// In-memory cluster fakes for exercising the reset flow
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::context::Confirm;
use super::tunnel::Tunnel;
use crate::config::{EnvironmentConfig, LocalClusterConfig, PortForwardConfig, Timings};
use crate::k8s::models::PodPhase;
use crate::k8s::{
    ClaimPhase, ClusterApi, DeleteOutcome, NamespaceState, PodObservation,
    VolumeClaimObservation,
};
use crate::kind::LocalCluster;

/// Every call the fake cluster received, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentContext,
    UseContext(String),
    NamespaceState(String),
    DeleteNamespace(String),
    CreateNamespace(String),
    ApplyOverlay(PathBuf),
    ListPods(String),
    VolumeClaim(String),
    TailLogs(String),
}

impl Call {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::UseContext(_)
                | Call::DeleteNamespace(_)
                | Call::CreateNamespace(_)
                | Call::ApplyOverlay(_)
        )
    }
}

struct FakeNamespace {
    generation: u32,
    /// `Some(n)`: terminating, gone after `n` more state reads
    terminating: Option<Option<u32>>,
    pods: Vec<PodObservation>,
}

struct FakeState {
    context: String,
    namespaces: HashMap<String, FakeNamespace>,
    generations: HashMap<String, u32>,
    /// `None`: deletion never completes
    terminating_reads: Option<u32>,
    applied: bool,
    apply_fails: bool,
    pod_script: Vec<Vec<PodObservation>>,
    pod_cursor: usize,
    claim_script: Vec<ClaimPhase>,
    claim_cursor: usize,
    logs: String,
}

/// Scripted cluster: namespaces go through Terminating before disappearing,
/// pods and claim phases follow their scripts once an overlay is applied.
pub struct FakeCluster {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCluster {
    pub fn new(context: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                context: context.to_string(),
                namespaces: HashMap::new(),
                generations: HashMap::new(),
                terminating_reads: Some(1),
                applied: false,
                apply_fails: false,
                pod_script: Vec::new(),
                pod_cursor: 0,
                claim_script: Vec::new(),
                claim_cursor: 0,
                logs: String::new(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_namespace(self, namespace: &str, pods: Vec<PodObservation>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.generations.insert(namespace.to_string(), 1);
            state.namespaces.insert(
                namespace.to_string(),
                FakeNamespace {
                    generation: 1,
                    terminating: None,
                    pods,
                },
            );
        }
        self
    }

    /// Namespace reads report Terminating this many times before Absent
    pub fn terminating_for(self, reads: u32) -> Self {
        self.state.lock().unwrap().terminating_reads = Some(reads);
        self
    }

    pub fn stuck_terminating(self) -> Self {
        self.state.lock().unwrap().terminating_reads = None;
        self
    }

    /// Successive pod lists after apply; the last one repeats
    pub fn pods_after_apply(self, script: Vec<Vec<PodObservation>>) -> Self {
        self.state.lock().unwrap().pod_script = script;
        self
    }

    /// Successive claim phases after apply; the last one repeats
    pub fn claim_phases(self, script: Vec<ClaimPhase>) -> Self {
        self.state.lock().unwrap().claim_script = script;
        self
    }

    pub fn logs(self, logs: &str) -> Self {
        self.state.lock().unwrap().logs = logs.to_string();
        self
    }

    pub fn failing_apply(self) -> Self {
        self.state.lock().unwrap().apply_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matcher: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matcher(c)).count()
    }

    /// Position of the first call matching, for ordering assertions
    pub fn position(&self, matcher: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(matcher)
    }

    pub fn generation(&self, namespace: &str) -> Option<u32> {
        let state = self.state.lock().unwrap();
        state
            .namespaces
            .get(namespace)
            .filter(|ns| ns.terminating.is_none())
            .map(|ns| ns.generation)
    }

    pub fn pods_in(&self, namespace: &str) -> Vec<PodObservation> {
        let state = self.state.lock().unwrap();
        state
            .namespaces
            .get(namespace)
            .map(|ns| ns.pods.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn scripted<T: Clone>(script: &[T], cursor: &mut usize) -> Option<T> {
    let value = script.get(*cursor).or_else(|| script.last())?.clone();
    if *cursor + 1 < script.len() {
        *cursor += 1;
    }
    Some(value)
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn current_context(&self) -> Result<String> {
        self.record(Call::CurrentContext);
        Ok(self.state.lock().unwrap().context.clone())
    }

    async fn use_context(&self, context: &str) -> Result<()> {
        self.record(Call::UseContext(context.to_string()));
        self.state.lock().unwrap().context = context.to_string();
        Ok(())
    }

    async fn namespace_state(&self, namespace: &str) -> Result<NamespaceState> {
        self.record(Call::NamespaceState(namespace.to_string()));
        let mut state = self.state.lock().unwrap();
        let Some(terminating) = state.namespaces.get(namespace).map(|ns| ns.terminating) else {
            return Ok(NamespaceState::Absent);
        };
        match terminating {
            None => Ok(NamespaceState::Exists),
            Some(None) => Ok(NamespaceState::Terminating),
            Some(Some(0)) => {
                state.namespaces.remove(namespace);
                Ok(NamespaceState::Absent)
            }
            Some(Some(left)) => {
                if let Some(ns) = state.namespaces.get_mut(namespace) {
                    ns.terminating = Some(Some(left - 1));
                }
                Ok(NamespaceState::Terminating)
            }
        }
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<DeleteOutcome> {
        self.record(Call::DeleteNamespace(namespace.to_string()));
        let mut state = self.state.lock().unwrap();
        let reads = state.terminating_reads;
        state.applied = false;
        match state.namespaces.get_mut(namespace) {
            Some(ns) => {
                if ns.terminating.is_none() {
                    ns.terminating = Some(reads);
                }
                Ok(DeleteOutcome::Deleted)
            }
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn create_namespace(&self, namespace: &str) -> Result<()> {
        self.record(Call::CreateNamespace(namespace.to_string()));
        let mut state = self.state.lock().unwrap();
        if state.namespaces.contains_key(namespace) {
            anyhow::bail!("namespaces \"{}\" already exists", namespace);
        }
        let generation = state.generations.get(namespace).copied().unwrap_or(0) + 1;
        state.generations.insert(namespace.to_string(), generation);
        state.namespaces.insert(
            namespace.to_string(),
            FakeNamespace {
                generation,
                terminating: None,
                pods: Vec::new(),
            },
        );
        Ok(())
    }

    async fn apply_overlay(&self, overlay: &Path) -> Result<String> {
        self.record(Call::ApplyOverlay(overlay.to_path_buf()));
        let mut state = self.state.lock().unwrap();
        state.applied = true;
        state.pod_cursor = 0;
        state.claim_cursor = 0;
        if state.apply_fails {
            anyhow::bail!("error: unable to recognize \"{}\"", overlay.display());
        }
        Ok("deployment.apps/backend created\n".to_string())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodObservation>> {
        self.record(Call::ListPods(namespace.to_string()));
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let next = if state.applied {
            scripted(&state.pod_script, &mut state.pod_cursor)
        } else {
            None
        };
        match state.namespaces.get_mut(namespace) {
            Some(ns) => {
                if let Some(pods) = next {
                    ns.pods = pods;
                }
                Ok(ns.pods.clone())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn volume_claim(&self, _namespace: &str, claim: &str) -> Result<VolumeClaimObservation> {
        self.record(Call::VolumeClaim(claim.to_string()));
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let phase = if state.applied {
            scripted(&state.claim_script, &mut state.claim_cursor).unwrap_or(ClaimPhase::Bound)
        } else {
            ClaimPhase::Unknown
        };
        Ok(VolumeClaimObservation::new(claim, phase))
    }

    async fn tail_logs(&self, _namespace: &str, deployment: &str, _lines: u32) -> Result<String> {
        self.record(Call::TailLogs(deployment.to_string()));
        Ok(self.state.lock().unwrap().logs.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCall {
    DeleteCluster(String),
    CreateCluster(String),
    PrepareDir(String, String),
    CopyToNode(PathBuf, String, String),
}

/// Local cluster that records calls and succeeds unless told otherwise
pub struct FakeLocalCluster {
    exists: Mutex<bool>,
    create_fails: bool,
    calls: Mutex<Vec<LocalCall>>,
}

impl FakeLocalCluster {
    pub fn new(exists: bool) -> Self {
        Self {
            exists: Mutex::new(exists),
            create_fails: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_create(mut self) -> Self {
        self.create_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<LocalCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalCluster for FakeLocalCluster {
    async fn delete_cluster(&self, name: &str) -> Result<DeleteOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push(LocalCall::DeleteCluster(name.to_string()));
        let mut exists = self.exists.lock().unwrap();
        if *exists {
            *exists = false;
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    async fn create_cluster(&self, name: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(LocalCall::CreateCluster(name.to_string()));
        if self.create_fails {
            anyhow::bail!("ERROR: failed to create cluster: node(s) already exist");
        }
        *self.exists.lock().unwrap() = true;
        Ok(())
    }

    async fn prepare_dir(&self, node: &str, dir: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(LocalCall::PrepareDir(node.to_string(), dir.to_string()));
        Ok(())
    }

    async fn copy_to_node(&self, source: &Path, node: &str, dir: &str) -> Result<()> {
        self.calls.lock().unwrap().push(LocalCall::CopyToNode(
            source.to_path_buf(),
            node.to_string(),
            dir.to_string(),
        ));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelCall {
    ReleasePort(u16),
    Forward(String, String, u16, u16),
}

/// Tunnel that returns as if the operator pressed Ctrl-C immediately
#[derive(Default)]
pub struct FakeTunnel {
    calls: Mutex<Vec<TunnelCall>>,
}

impl FakeTunnel {
    pub fn calls(&self) -> Vec<TunnelCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tunnel for FakeTunnel {
    async fn release_port(&self, port: u16) -> Result<usize> {
        self.calls.lock().unwrap().push(TunnelCall::ReleasePort(port));
        Ok(0)
    }

    async fn forward(&self, namespace: &str, config: &PortForwardConfig) -> Result<()> {
        self.calls.lock().unwrap().push(TunnelCall::Forward(
            namespace.to_string(),
            config.target.clone(),
            config.local_port,
            config.remote_port,
        ));
        Ok(())
    }
}

/// Operator who always gives the same answer
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _question: &str) -> bool {
        self.0
    }
}

pub fn ready(name: &str) -> PodObservation {
    PodObservation::new(name, 1, 1, PodPhase::Running)
}

pub fn unready(name: &str) -> PodObservation {
    PodObservation::new(name, 0, 1, PodPhase::Running)
}

pub fn completed(name: &str) -> PodObservation {
    PodObservation::new(name, 0, 1, PodPhase::Completed)
}

/// Environment with default timings targeting `namespace` on `context`
pub fn environment(context: &str, namespace: &str) -> EnvironmentConfig {
    EnvironmentConfig {
        context: context.to_string(),
        namespace: namespace.to_string(),
        overlay: PathBuf::from("overlays/test"),
        volume_claim: "data".to_string(),
        deployment: "backend".to_string(),
        ready_marker: "Application startup complete".to_string(),
        timings: Timings::default(),
        cluster: None,
        port_forward: None,
    }
}

pub fn local_cluster(seed_dataset: PathBuf) -> LocalClusterConfig {
    LocalClusterConfig {
        name: "oim-dev".to_string(),
        seed_dataset,
        seed_dir: "/seed".to_string(),
        node: None,
    }
}
