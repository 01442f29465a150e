//! CLI command definitions and dispatch for the `concierge` binary.
//!
//! Uses clap derive macros for argument parsing. Every command that touches
//! the topology reads `concierge.toml` (or `--config`) and then layers the
//! environment overrides on top.

pub mod deploy;
pub mod plan;
pub mod respond;
pub mod synth;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use concierge_infra::config::{
    apply_env_overrides, load_deployment_config, read_deployment_config, CONFIG_FILE,
};
use concierge_types::config::DeploymentConfig;

/// Plan and deploy the hotel concierge bot and its knowledge backend.
#[derive(Parser)]
#[command(name = "concierge", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the build order and waves of the concierge topology.
    Plan {
        /// Config file (defaults to ./concierge.toml when present).
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Build the topology against the in-memory backend.
    Deploy {
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Build independent units of the same wave concurrently.
        #[arg(long)]
        concurrent: bool,
    },

    /// Write one template per unit plus a manifest.
    Synth {
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Output directory.
        #[arg(long, short, default_value = "cdk.out")]
        out: PathBuf,
    },

    /// Answer a dialog event with the booking handler.
    Respond {
        /// Event JSON file (reads stdin when omitted).
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Start the fulfillment HTTP server.
    Serve {
        /// Port to listen on.
        #[arg(long, short, default_value_t = 3000, env = "CONCIERGE_PORT")]
        port: u16,

        /// Host address to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Resolve the deployment configuration for a command.
///
/// An explicit `--config` must exist and parse; the implicit
/// `./concierge.toml` falls back to defaults.
pub async fn load_config(path: Option<&Path>) -> anyhow::Result<DeploymentConfig> {
    let config = match path {
        Some(path) => read_deployment_config(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => load_deployment_config(Path::new(CONFIG_FILE)).await,
    };
    Ok(apply_env_overrides(config))
}
