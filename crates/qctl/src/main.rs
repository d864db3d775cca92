//! qctl - tools for Quorum test networks
//!
//! ## Commands
//!
//! - `quorum up`: build a network from a YAML configuration
//! - `quorum down`: destroy every resource labelled with a provisioning name
//! - `version`: print the tool version

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use qnet_core::{
    ContainerEngine, DockerEngine, ExportSink, ProvisionConfig, ProvisionSpan, Provisioner,
};

#[derive(Parser)]
#[command(name = "qctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "qctl provides a set of tools for Quorum", long_about = None)]
struct Cli {
    /// Logging verbosity: 0=silent, 1=error, 2=warn, 3=info, 4=debug, 5=detail
    #[arg(short, long, global = true, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=5))]
    verbosity: u8,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quorum network provisioning
    Quorum {
        #[command(subcommand)]
        action: QuorumAction,
    },

    /// Display version of this tool
    Version,
}

#[derive(Subcommand)]
enum QuorumAction {
    /// Build a network with specified configuration
    Up {
        /// Network configuration file (YAML)
        #[arg(short, long, env = "QCTL_CONFIG", default_value = "quorum.yml")]
        config: PathBuf,

        /// Export information about the network to a file or stdout (use hyphen)
        #[arg(short, long)]
        export: Option<String>,

        /// Only create the network and start the transaction managers
        #[arg(long)]
        tx_managers_only: bool,
    },

    /// Destroy a network and everything labelled with its name
    #[command(alias = "destroy")]
    Down {
        /// Provisioning name used when the network was built
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    qnet_core::init_tracing(cli.json, qnet_core::level_from_verbosity(cli.verbosity));

    match cli.command {
        Commands::Quorum { action } => match action {
            QuorumAction::Up {
                config,
                export,
                tx_managers_only,
            } => cmd_up(&config, export.as_deref(), tx_managers_only).await,
            QuorumAction::Down { name } => cmd_down(&name).await,
        },
        Commands::Version => {
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn connect_engine() -> Result<Arc<dyn ContainerEngine>> {
    let engine = DockerEngine::connect().context("Failed to connect to the Docker daemon")?;
    Ok(Arc::new(engine))
}

/// Build a network and optionally export a description of it
async fn cmd_up(config_path: &Path, export: Option<&str>, tx_managers_only: bool) -> Result<()> {
    let config = ProvisionConfig::from_path(config_path)
        .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;
    let _span = ProvisionSpan::enter(&config.name, "up");

    let engine = connect_engine()?;
    let mut run = Provisioner::new(config, engine)?;

    run.build()
        .await
        .with_context(|| format!("Failed to build network {}", run.name()))?;
    if !tx_managers_only {
        run.start_nodes()
            .await
            .with_context(|| format!("Failed to start nodes of {}", run.name()))?;
    }
    info!(name = %run.name(), containers = run.resources().len(), "network is up");

    if let Some(target) = export {
        let sink = ExportSink::parse(target);
        run.report()
            .await
            .export(&sink)
            .with_context(|| format!("Failed to export network information to {target}"))?;
    }

    Ok(())
}

/// Destroy every resource labelled with `name`
async fn cmd_down(name: &str) -> Result<()> {
    let _span = ProvisionSpan::enter(name, "down");

    let engine = connect_engine()?;
    qnet_core::destroy(engine, name)
        .await
        .with_context(|| format!("Failed to destroy network {name}"))?;

    println!("Destroyed network {name}");
    Ok(())
}
