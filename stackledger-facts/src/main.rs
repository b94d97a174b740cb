//! hypervisor-facts - snapshot OpenStack hypervisor inventory
//!
//! Authenticates with the `OS_*` credentials, lists hypervisors, and writes a
//! new `hypervisor_facts_<timestamp>.json` only when the inventory changed.

use anyhow::{Context, Result};
use clap::Parser;
use stackledger_core::{logging, KeystoneSession, OsCredentials};
use stackledger_facts::{run, Cli, FactsConfig, NovaInventory, RunOutcome};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FactsConfig::load(&cli)
        .await
        .context("Failed to load configuration")?;

    logging::init(config.verbose, Level::INFO);
    info!("Configuration file: {}", config.config_file.display());

    let creds = OsCredentials::from_env().context("Failed to read OpenStack credentials")?;
    let session = KeystoneSession::authenticate(&creds)
        .await
        .context("Failed to authenticate with Keystone")?;
    let inventory = NovaInventory::new(session).context("Failed to locate compute endpoint")?;

    match run(&config, &inventory)
        .await
        .context("Hypervisor fact collection failed")?
    {
        RunOutcome::Written(path) => info!("New snapshot: {}", path.display()),
        RunOutcome::Unchanged => info!("Inventory unchanged, nothing written"),
    }

    Ok(())
}
