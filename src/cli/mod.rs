//! Command-line interface for arts.
//!
//! Provides commands for serving the run task endpoints, computing workspace
//! signatures offline, and inspecting the resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{self, Overrides};
use crate::core::{Orchestrator, SignatureVerifier};
use crate::server::{AppState, BridgeApi};

/// arts - Terraform Cloud run tasks for Ansible AWX
#[derive(Parser, Debug)]
#[command(name = "arts")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the run task endpoints
    Serve {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the signature for a workspace id
    Sign(SignArgs),

    /// Show resolved configuration (secrets redacted)
    Config {
        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Terraform Cloud workspace id (ws-...)
    #[arg(long)]
    pub workspace_id: String,

    /// Shared secret for workspace signatures
    #[arg(long, env = "ARTS_HMAC_KEY", hide_env_values = true)]
    pub hmac_key: String,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve { overrides } => serve(overrides).await,
            Commands::Sign(args) => sign(args),
            Commands::Config { overrides } => show_config(overrides),
        }
    }
}

async fn serve(overrides: Overrides) -> Result<()> {
    let config = config::load(overrides)?;
    tracing::info!(
        host = %config.platform.host,
        config_file = ?config.config_file,
        "Configuration loaded"
    );

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    BridgeApi::start(AppState::new(orchestrator), &config.server).await
}

fn sign(args: SignArgs) -> Result<()> {
    if args.hmac_key.trim().is_empty() {
        anyhow::bail!("HMAC key must not be empty");
    }

    let verifier = SignatureVerifier::new(args.hmac_key.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid HMAC key: {}", e))?;
    println!("{}", verifier.sign(&args.workspace_id));
    Ok(())
}

fn show_config(overrides: Overrides) -> Result<()> {
    let config = config::load(overrides).context("Configuration is incomplete")?;
    println!("{:#?}", config);
    Ok(())
}
