//! Hypervisor fact reporting
//!
//! One pass per invocation:
//! - Fetch the detailed hypervisor listing from the compute service
//! - Wrap it in a UTC-stamped snapshot
//! - Compare it, order-insensitively, with the newest snapshot on disk
//! - Write `hypervisor_facts_<timestamp>.json` only when something changed

pub mod collector;
pub mod config;
pub mod dedup;

use chrono::{DateTime, Utc};
use stackledger_core::{HypervisorInventory, Result};
use std::path::PathBuf;
use tracing::info;

pub use collector::{FactCollector, NovaInventory};
pub use config::{Cli, FactsConfig, FactsOverrides};
pub use dedup::{canonicalize, Canonical, SnapshotStore};

/// Result of one collection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Written(PathBuf),
    Unchanged,
}

/// Collect, deduplicate against the output directory, and write if new
pub async fn run(config: &FactsConfig, inventory: &dyn HypervisorInventory) -> Result<RunOutcome> {
    run_at(config, inventory, Utc::now()).await
}

pub async fn run_at(
    config: &FactsConfig,
    inventory: &dyn HypervisorInventory,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let snapshot = FactCollector::new(inventory).collect_at(now).await?;
    let store = SnapshotStore::new(&config.outdir);

    if !store.is_new_data(&snapshot).await? {
        return Ok(RunOutcome::Unchanged);
    }

    let path = store.write(&snapshot).await?;
    info!("Snapshot of {} hypervisors saved", snapshot.hypervisors.len());
    Ok(RunOutcome::Written(path))
}
