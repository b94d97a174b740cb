//! event-report - OpenStack billing events for a time window
//!
//! Reads events from Panko (database or REST API), attaches user, project
//! and domain names from Keystone, and writes `<start>_<end>.json`.

use anyhow::{Context, Result};
use clap::Parser;
use stackledger_core::identity::KeystoneDirectory;
use stackledger_core::{logging, EventSource, KeystoneSession, OsCredentials};
use stackledger_events::{run, ApiEventSource, Cli, DbEventSource, ReportConfig, SourceSelection};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ReportConfig::load(&cli)
        .await
        .context("Failed to load configuration")?;

    logging::init(config.verbose, Level::INFO);
    info!("Configuration file: {}", config.config_file.display());

    let creds = OsCredentials::from_env().context("Failed to read OpenStack credentials")?;
    let session = KeystoneSession::authenticate(&creds)
        .await
        .context("Failed to authenticate with Keystone")?;

    let source: Box<dyn EventSource> = match &config.source {
        SourceSelection::Database(settings) => Box::new(DbEventSource::new(settings.clone())),
        SourceSelection::Api => Box::new(
            ApiEventSource::new(session.clone()).context("Failed to locate event endpoint")?,
        ),
    };
    let identity = KeystoneDirectory::new(session).context("Failed to locate identity endpoint")?;

    let outcome = run(&config, source.as_ref(), &identity)
        .await
        .context("Event report failed")?;
    info!(
        "Report {} written with {} events ({} resolved)",
        outcome.path.display(),
        outcome.events,
        outcome.resolution.resolved
    );

    Ok(())
}
