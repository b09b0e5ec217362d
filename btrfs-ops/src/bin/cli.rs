// SPDX-License-Identifier: GPL-3.0-only

//! CLI wrapper around the btrfs-ops library for testing and manual operations

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use btrfs_ops::{
    MaintenanceDomain, OperationRequest, Orchestrator, OrchestratorConfig, Registry, StatusPoller,
};
use clap::{Parser, Subcommand};

/// Run validated btrfs maintenance operations
#[derive(Parser)]
#[command(name = "btrfs-ops-cli")]
#[command(about = "CLI tool for btrfs maintenance operations", long_about = None)]
struct Cli {
    /// Run btrfs directly instead of behind the privilege prefix
    #[arg(long, global = true)]
    unprivileged: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List block devices
    Devices,
    /// List mounted paths
    Mounts,
    /// List every supported operation and its parameters
    Operations,
    /// Run one operation
    Run {
        /// Maintenance domain, e.g. subvolume or scrub
        domain: MaintenanceDomain,
        /// Subcommand within the domain, e.g. create or start
        subcommand: String,
        /// Value parameter as name=value
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Flag parameter to set
        #[arg(long = "flag", value_name = "NAME")]
        flags: Vec<String>,
    },
    /// Poll balance or scrub status
    Poll {
        /// balance or scrub
        domain: MaintenanceDomain,
        /// Mount path (or device, for scrub)
        target: String,
        /// Seconds between polls
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        /// Stop after this many results
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = OrchestratorConfig::from_env();
    if cli.unprivileged {
        config.privilege_prefix.clear();
    }
    let orchestrator = Orchestrator::from_config(config)?;

    match cli.command {
        Commands::Devices => {
            let devices = orchestrator.devices().await?;
            println!("{}", serde_json::to_string(&devices)?);
        }
        Commands::Mounts => {
            let mounts = orchestrator.mounted_paths().await?;
            println!("{}", serde_json::to_string(&mounts)?);
        }
        Commands::Operations => {
            let operations: Vec<_> = Registry::global().operations().collect();
            println!("{}", serde_json::to_string(&operations)?);
        }
        Commands::Run {
            domain,
            subcommand,
            params,
            flags,
        } => {
            let request = build_request(domain, subcommand, &params, &flags)?;
            let result = orchestrator.submit(request).await?;
            println!("{}", serde_json::to_string(&result)?);
            if !result.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Poll {
            domain,
            target,
            interval_secs,
            count,
        } => {
            let orchestrator = Arc::new(orchestrator);
            let mut handle = StatusPoller::spawn(
                orchestrator,
                domain,
                &target,
                Duration::from_secs(interval_secs.max(1)),
            )?;

            for _ in 0..count {
                let Some(result) = handle.recv().await else {
                    break;
                };
                println!("{}", serde_json::to_string(&result)?);
            }

            handle.stop().await?;
        }
    }

    Ok(())
}

fn build_request(
    domain: MaintenanceDomain,
    subcommand: String,
    params: &[String],
    flags: &[String],
) -> Result<OperationRequest> {
    let mut request = OperationRequest::new(domain, subcommand);

    for param in params {
        let Some((name, value)) = param.split_once('=') else {
            bail!("Expected NAME=VALUE, got '{}'", param);
        };
        if name.is_empty() {
            bail!("Parameter name missing in '{}'", param);
        }
        request = request.with_text(name, value);
    }

    for flag in flags {
        request = request.with_flag(flag, true);
    }

    tracing::debug!(?request, "Built request from command line");
    Ok(request)
}
