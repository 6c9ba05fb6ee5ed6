/// cluster-reset - tear down and redeploy a development environment
///
/// Resets one environment's namespace (or, for dev, the whole local kind
/// cluster), reapplies its manifests, and waits until storage, pods, and the
/// backend report ready.
mod config;
mod k8s;
mod kind;
mod reset;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Environment, ResetConfig};
use crate::k8s::models::render_pod_table;
use crate::k8s::{ClusterApi, KubectlClient};
use crate::kind::KindCluster;
use crate::reset::{
    ensure_context, KubectlTunnel, Orchestrator, ProgressReporter, ResetMode, TerminalConfirm,
};

#[derive(Parser)]
#[command(name = "cluster-reset")]
#[command(about = "Reset a development environment and wait until it is ready", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "reset.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete and recreate the environment, then wait for readiness
    Reset {
        /// Target environment
        #[arg(short, long, value_enum, default_value_t = Environment::Dev)]
        env: Environment,

        /// Rebuild the whole local cluster (dev only)
        #[arg(long)]
        nuke: bool,

        /// Offer to switch kubectl context when it does not match
        #[arg(long)]
        switch_context: bool,
    },

    /// Show pods and storage claim of an environment
    Status {
        /// Target environment
        #[arg(short, long, value_enum, default_value_t = Environment::Dev)]
        env: Environment,
    },

    /// Generate example configuration file
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cluster_reset={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Reset {
            env,
            nuke,
            switch_context,
        } => run_reset(&cli, env, nuke, switch_context).await,
        Commands::Status { env } => show_status(&cli, env).await,
        Commands::Init => init_config(&cli).await,
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Reset an environment; only fatal errors surface here
async fn run_reset(cli: &Cli, env: Environment, nuke: bool, switch_context: bool) -> Result<()> {
    KubectlClient::check_kubectl_installed()
        .await
        .context("kubectl is required")?;
    if nuke {
        KindCluster::check_tools_installed()
            .await
            .context("kind and docker are required for --nuke")?;
    }

    let config = ResetConfig::from_file(&cli.config).context("Failed to load configuration")?;
    let env_config = config.environment(env).clone();
    let mode = if nuke { ResetMode::Nuke } else { ResetMode::Quick };
    let reporter = ProgressReporter::new(env_config.timings.spinner_tick());

    let mut orchestrator = Orchestrator::new(
        env,
        env_config,
        mode,
        Arc::new(KubectlClient::new()),
        Arc::new(KindCluster::new()),
        Arc::new(KubectlTunnel),
        reporter,
    );
    if switch_context {
        orchestrator = orchestrator.with_context_switch(Box::new(TerminalConfirm));
    }

    orchestrator.run().await?;
    Ok(())
}

/// Read-only view of an environment
async fn show_status(cli: &Cli, env: Environment) -> Result<()> {
    KubectlClient::check_kubectl_installed()
        .await
        .context("kubectl is required")?;

    let config = ResetConfig::from_file(&cli.config).context("Failed to load configuration")?;
    let env_config = config.environment(env);
    let client = KubectlClient::new();

    ensure_context(&client, &env_config.context, None).await?;

    let namespace = &env_config.namespace;
    let state = client.namespace_state(namespace).await?;
    info!("Environment: {}", env);
    info!("Namespace: {} ({})", namespace, state);

    match client.volume_claim(namespace, &env_config.volume_claim).await {
        Ok(claim) => info!("Storage claim: {} ({})", claim.name, claim.phase),
        Err(e) => warn!("Could not read claim {}: {:#}", env_config.volume_claim, e),
    }

    let pods = client.list_pods(namespace).await?;
    if pods.is_empty() {
        info!("No pods in {}", namespace);
        return Ok(());
    }

    info!("");
    for line in render_pod_table(&pods) {
        info!("  {}", line);
    }

    Ok(())
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let example_config = ResetConfig::example();
    let yaml = serde_yaml::to_string(&example_config)?;

    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Edit the contexts, namespaces, and overlay paths for your environments");
    info!("  2. Reset the dev environment:");
    info!("     cluster-reset reset --env dev");
    info!("  3. Rebuild the local cluster from scratch:");
    info!("     cluster-reset reset --env dev --nuke");

    Ok(())
}
