/// Configuration for the reset orchestrator
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Target environment of a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    /// Local kind cluster, ends in a port-forward session
    Dev,
    /// Shared cluster, ends in a status report
    Uat,
}

impl Environment {
    /// Seconds before the first backend log check when not configured
    pub fn default_probe_delay_secs(self) -> u64 {
        match self {
            Environment::Dev => 20,
            Environment::Uat => 30,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Dev => write!(f, "dev"),
            Environment::Uat => write!(f, "uat"),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetConfig {
    /// Local development environment
    pub dev: EnvironmentConfig,

    /// User acceptance environment
    pub uat: EnvironmentConfig,
}

/// Everything the orchestrator needs to know about one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Expected kubectl context; a mismatch aborts the run
    pub context: String,

    /// Namespace that is torn down and recreated
    pub namespace: String,

    /// Overlay directory handed to `kubectl apply -k`
    pub overlay: PathBuf,

    /// Storage claim that must bind after the overlay is applied
    pub volume_claim: String,

    /// Deployment whose logs confirm backend startup
    pub deployment: String,

    /// Log line fragment that marks the backend as ready
    pub ready_marker: String,

    /// Poll intervals and budgets
    #[serde(default)]
    pub timings: Timings,

    /// Local cluster settings (required for nuke mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<LocalClusterConfig>,

    /// Tunnel opened at the end of a dev reset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_forward: Option<PortForwardConfig>,
}

/// Local kind cluster rebuilt in nuke mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalClusterConfig {
    /// kind cluster name
    pub name: String,

    /// Seed dataset on the host, copied onto the control node
    pub seed_dataset: PathBuf,

    /// Working directory for the seed on the control node
    #[serde(default = "default_seed_dir")]
    pub seed_dir: String,

    /// Control node container (defaults to `<name>-control-plane`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

impl LocalClusterConfig {
    /// Container name of the control node
    pub fn control_node(&self) -> String {
        self.node
            .clone()
            .unwrap_or_else(|| format!("{}-control-plane", self.name))
    }
}

/// Local tunnel into the cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortForwardConfig {
    /// kubectl port-forward target, e.g. `svc/proxy`
    pub target: String,

    /// Port on the operator's machine
    pub local_port: u16,

    /// Port on the target
    pub remote_port: u16,
}

/// Poll cadences and budgets, in seconds unless noted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub namespace_delete_timeout_secs: u64,
    pub namespace_delete_interval_secs: u64,
    pub claim_bind_timeout_secs: u64,
    pub claim_bind_interval_secs: u64,
    pub pods_ready_timeout_secs: u64,
    pub pods_ready_interval_secs: u64,
    /// Unset means the environment's default (dev 20s, uat 30s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_initial_delay_secs: Option<u64>,
    pub probe_attempts: u32,
    pub probe_interval_secs: u64,
    pub probe_tail_lines: u32,
    pub spinner_tick_millis: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            namespace_delete_timeout_secs: 120,
            namespace_delete_interval_secs: 2,
            claim_bind_timeout_secs: 60,
            claim_bind_interval_secs: 3,
            pods_ready_timeout_secs: 300,
            pods_ready_interval_secs: 3,
            probe_initial_delay_secs: None,
            probe_attempts: 12,
            probe_interval_secs: 5,
            probe_tail_lines: 100,
            spinner_tick_millis: 100,
        }
    }
}

impl Timings {
    pub fn namespace_delete_timeout(&self) -> Duration {
        Duration::from_secs(self.namespace_delete_timeout_secs)
    }

    pub fn namespace_delete_interval(&self) -> Duration {
        Duration::from_secs(self.namespace_delete_interval_secs)
    }

    pub fn claim_bind_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_bind_timeout_secs)
    }

    pub fn claim_bind_interval(&self) -> Duration {
        Duration::from_secs(self.claim_bind_interval_secs)
    }

    pub fn pods_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.pods_ready_timeout_secs)
    }

    pub fn pods_ready_interval(&self) -> Duration {
        Duration::from_secs(self.pods_ready_interval_secs)
    }

    pub fn probe_initial_delay(&self, env: Environment) -> Duration {
        Duration::from_secs(
            self.probe_initial_delay_secs
                .unwrap_or_else(|| env.default_probe_delay_secs()),
        )
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn spinner_tick(&self) -> Duration {
        Duration::from_millis(self.spinner_tick_millis)
    }

    fn validate(&self, env: &str) -> anyhow::Result<()> {
        let pairs = [
            (
                "namespace_delete",
                self.namespace_delete_timeout_secs,
                self.namespace_delete_interval_secs,
            ),
            (
                "claim_bind",
                self.claim_bind_timeout_secs,
                self.claim_bind_interval_secs,
            ),
            (
                "pods_ready",
                self.pods_ready_timeout_secs,
                self.pods_ready_interval_secs,
            ),
        ];
        for (name, timeout, interval) in pairs {
            if interval == 0 {
                anyhow::bail!("{}: timings.{}_interval_secs must be > 0", env, name);
            }
            if timeout < interval {
                anyhow::bail!(
                    "{}: timings.{}_timeout_secs ({}) is shorter than its interval ({})",
                    env,
                    name,
                    timeout,
                    interval
                );
            }
        }
        if self.probe_attempts == 0 {
            anyhow::bail!("{}: timings.probe_attempts must be at least 1", env);
        }
        if self.spinner_tick_millis == 0 {
            anyhow::bail!("{}: timings.spinner_tick_millis must be > 0", env);
        }
        Ok(())
    }
}

fn default_seed_dir() -> String {
    "/seed".to_string()
}

impl ResetConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ResetConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings for one environment
    pub fn environment(&self, env: Environment) -> &EnvironmentConfig {
        match env {
            Environment::Dev => &self.dev,
            Environment::Uat => &self.uat,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.dev.validate("dev")?;
        self.uat.validate("uat")?;
        Ok(())
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            dev: EnvironmentConfig {
                context: "kind-oim-dev".to_string(),
                namespace: "oim".to_string(),
                overlay: PathBuf::from("deploy/overlays/dev"),
                volume_claim: "oim-postgres-data".to_string(),
                deployment: "oim-backend".to_string(),
                ready_marker: "Application startup complete".to_string(),
                timings: Timings::default(),
                cluster: Some(LocalClusterConfig {
                    name: "oim-dev".to_string(),
                    seed_dataset: PathBuf::from("data/seed.sql.gz"),
                    seed_dir: default_seed_dir(),
                    node: None,
                }),
                port_forward: Some(PortForwardConfig {
                    target: "svc/oim-proxy".to_string(),
                    local_port: 8080,
                    remote_port: 80,
                }),
            },
            uat: EnvironmentConfig {
                context: "az-aks-oim03".to_string(),
                namespace: "oim-uat".to_string(),
                overlay: PathBuf::from("deploy/overlays/uat"),
                volume_claim: "oim-postgres-data".to_string(),
                deployment: "oim-backend".to_string(),
                ready_marker: "Application startup complete".to_string(),
                timings: Timings::default(),
                cluster: None,
                port_forward: None,
            },
        }
    }
}

impl EnvironmentConfig {
    fn validate(&self, env: &str) -> anyhow::Result<()> {
        let required = [
            ("context", &self.context),
            ("namespace", &self.namespace),
            ("volume_claim", &self.volume_claim),
            ("deployment", &self.deployment),
            ("ready_marker", &self.ready_marker),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("{}.{} cannot be empty", env, field);
            }
        }

        if let Some(cluster) = &self.cluster {
            if cluster.name.trim().is_empty() {
                anyhow::bail!("{}.cluster.name cannot be empty", env);
            }
        }

        if let Some(pf) = &self.port_forward {
            if pf.local_port == 0 || pf.remote_port == 0 {
                anyhow::bail!("{}.port_forward ports must be non-zero", env);
            }
        }

        self.timings.validate(env)
    }
}
