/// Dev port-forward session
use anyhow::Result;
use async_trait::async_trait;
use std::process::ExitStatus;
use tracing::{info, warn};

use crate::config::PortForwardConfig;
use crate::utils::command::CommandBuilder;

/// A local-to-cluster tunnel
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Terminate whatever listens on `port`, returning how many processes were signalled
    async fn release_port(&self, port: u16) -> Result<usize>;

    /// Forward until the operator interrupts or the tunnel exits
    async fn forward(&self, namespace: &str, config: &PortForwardConfig) -> Result<()>;
}

/// `kubectl port-forward`, with `lsof`/`kill` for stale listeners
#[derive(Debug, Clone, Default)]
pub struct KubectlTunnel;

/// Ctrl-C reaches kubectl too, since it shares the terminal's process group
#[cfg(unix)]
fn interrupted(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(2)
}

#[cfg(not(unix))]
fn interrupted(_status: &ExitStatus) -> bool {
    false
}

fn parse_pids(lsof_stdout: &str) -> Vec<u32> {
    lsof_stdout
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

#[async_trait]
impl Tunnel for KubectlTunnel {
    async fn release_port(&self, port: u16) -> Result<usize> {
        let output = CommandBuilder::new("lsof")
            .args(["-t".to_string(), format!("-iTCP:{}", port), "-sTCP:LISTEN".to_string()])
            .context("Failed to look up listeners")
            .output()
            .await?;

        // lsof exits 1 when nothing matches
        let pids = parse_pids(&output.stdout);
        for pid in &pids {
            info!("Stopping previous listener on port {} (pid {})", port, pid);
            if let Err(e) = CommandBuilder::new("kill")
                .arg(pid.to_string())
                .run_silent()
                .await
            {
                warn!("Could not stop pid {}: {:#}", pid, e);
            }
        }
        Ok(pids.len())
    }

    async fn forward(&self, namespace: &str, config: &PortForwardConfig) -> Result<()> {
        let mut child = CommandBuilder::new("kubectl")
            .args([
                "port-forward".to_string(),
                "-n".to_string(),
                namespace.to_string(),
                config.target.clone(),
                format!("{}:{}", config.local_port, config.remote_port),
            ])
            .context("Failed to start kubectl port-forward")
            .spawn_attached()?;

        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing tunnel");
                let _ = child.kill().await;
            }
            status = child.wait() => {
                let status = status?;
                if interrupted(&status) {
                    info!("Tunnel closed");
                } else if !status.success() {
                    anyhow::bail!("kubectl port-forward exited with {}", status);
                }
            }
        }
        Ok(())
    }
}

/// Opens the dev tunnel and blocks until the operator interrupts it
pub struct PortForwardSession<'a> {
    tunnel: &'a dyn Tunnel,
    namespace: &'a str,
    config: &'a PortForwardConfig,
}

impl<'a> PortForwardSession<'a> {
    pub fn new(tunnel: &'a dyn Tunnel, namespace: &'a str, config: &'a PortForwardConfig) -> Self {
        Self {
            tunnel,
            namespace,
            config,
        }
    }

    pub fn local_url(&self) -> String {
        format!("http://localhost:{}", self.config.local_port)
    }

    /// A stale tunnel on the same port is stopped first, best effort
    pub async fn open(&self) -> Result<()> {
        match self.tunnel.release_port(self.config.local_port).await {
            Ok(0) => {}
            Ok(n) => info!("Stopped {} previous tunnel process(es)", n),
            Err(e) => warn!(
                "Could not check port {} for a previous tunnel: {:#}",
                self.config.local_port, e
            ),
        }

        info!(
            "Forwarding {} -> {}:{} in {} (Ctrl-C to stop)",
            self.local_url(),
            self.config.target,
            self.config.remote_port,
            self.namespace
        );
        self.tunnel.forward(self.namespace, self.config).await
    }
}
