//! # kube-deploy
//!
//! Binary entry point: parses the command line, connects to the cluster (or
//! an in-memory stand-in for `--dry-run`), runs the deployment task and
//! reports the result. Exits non-zero when the run ends in `HasError`.

use anyhow::{Context, Result};
use clap::Parser;
use kube_deployer::cli::{Cli, Commands, DeployArgs, OutputFormat};
use kube_deployer::config::{DeployConfig, RuntimeConfig};
use kube_deployer::manifest::EnvVars;
use kube_deployer::observability::{self, metrics};
use kube_deployer::registry::ResourceRegistry;
use kube_deployer::updater::{ApplyMode, InMemoryResourceManager, KubeResourceManager, ResourceManager};
use kube_deployer::{DeploymentTask, TaskResult};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Required for rustls 0.23+ before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    let runtime = RuntimeConfig::from_env();
    observability::init_tracing(&runtime);

    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let cli = Cli::parse();
    match cli.command {
        Commands::Kinds => list_kinds(),
        Commands::Apply(args) => deploy(&args, ApplyMode::Apply, &runtime).await,
        Commands::Delete(args) => deploy(&args, ApplyMode::Delete, &runtime).await,
    }
}

fn list_kinds() -> Result<()> {
    let registry = ResourceRegistry::<InMemoryResourceManager>::new()?;
    for key in registry.keys() {
        println!("{}\t{}", key.api_version, key.kind);
    }
    Ok(())
}

async fn deploy(args: &DeployArgs, mode: ApplyMode, runtime: &RuntimeConfig) -> Result<()> {
    if runtime.enable_metrics {
        metrics::register_metrics()?;
    }
    let config = args.deploy_config(mode)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping before the next resource");
            cancel_tx.send_replace(true);
        }
    });

    let result = if args.dry_run {
        info!("Dry run: no changes will be made to the cluster");
        let manager = Arc::new(InMemoryResourceManager::new());
        run_task(config, manager, cancel_rx, runtime).await?
    } else {
        let (client, endpoint) = args.cluster.credentials()?.connect().await?;
        let manager = Arc::new(KubeResourceManager::new(client, Some(endpoint)));
        run_task(config, manager, cancel_rx, runtime).await?
    };

    report(&result, args.output)?;

    if let Some(path) = &args.export_env_file {
        write_env_file(path, &result.extra_env_vars)?;
    }
    if runtime.enable_metrics {
        if let Some(path) = args.metrics_file.as_ref().or(runtime.metrics_file.as_ref()) {
            metrics::write_text_file(path)?;
        }
    }

    if result.command_state.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_task<M: ResourceManager + 'static>(
    config: DeployConfig,
    manager: Arc<M>,
    cancel: watch::Receiver<bool>,
    runtime: &RuntimeConfig,
) -> Result<TaskResult> {
    let registry = Arc::new(ResourceRegistry::new().context("Failed to build resource registry")?);
    Ok(DeploymentTask::new(config, registry, manager)
        .with_env(EnvVars::from_process())
        .with_cancellation(cancel)
        .with_app_manager_timeout(runtime.app_manager_timeout())
        .run()
        .await)
}

fn report(result: &TaskResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(result).context("Failed to render result")?
            );
        }
        OutputFormat::Text => {
            for applied in &result.applied {
                let namespace = applied.namespace.as_deref().map(|ns| format!("{ns}/")).unwrap_or_default();
                println!("{} {}/{namespace}{}", applied.action, applied.kind, applied.name);
            }
            for (key, value) in &result.extra_env_vars {
                println!("{key}={value}");
            }
            match &result.error {
                Some(failure) => println!("{:?}: {} ({})", result.command_state, failure.message, failure.kind),
                None => println!("{:?} against {}", result.command_state, result.master_host),
            }
        }
    }
    Ok(())
}

fn write_env_file(path: &Path, vars: &BTreeMap<String, String>) -> Result<()> {
    let mut content = String::new();
    for (key, value) in vars {
        writeln!(content, "{key}={value}").context("Failed to format env file")?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), count = vars.len(), "Exported environment variables");
    Ok(())
}
