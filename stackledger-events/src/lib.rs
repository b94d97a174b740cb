//! Billing/usage event reporting
//!
//! One pass per invocation:
//! - Fetch the window's events from the database or the REST API, minus
//!   excluded event types
//! - Optionally collapse traits into top-level fields
//! - Resolve user, project and domain names through the identity service
//! - Write `<start>_<end>.json` with sorted keys

pub mod api;
pub mod config;
pub mod db;
pub mod reconcile;

use stackledger_core::identity::{decode_ids, IdentityIndex, ResolutionReport};
use stackledger_core::output::write_report;
use stackledger_core::{EventSource, IdentityDirectory, Result};
use std::path::PathBuf;
use tracing::info;

pub use api::ApiEventSource;
pub use config::{Cli, DbSettings, ReportConfig, ReportOverrides, SourceSelection};
pub use db::DbEventSource;
pub use reconcile::{attach_traits, collapse_traits, convert_ts, sort_by_generated};

/// What a report run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub path: PathBuf,
    pub events: usize,
    pub resolution: ResolutionReport,
}

pub async fn run(
    config: &ReportConfig,
    source: &dyn EventSource,
    identity: &dyn IdentityDirectory,
) -> Result<ReportOutcome> {
    let exclusions = config.exclusions();
    info!(
        "Fetching events from {} source for {} .. {}",
        source.name(),
        config.window.raw_start(),
        config.window.raw_end()
    );
    let mut events = source.fetch(&config.window, &exclusions).await?;

    if config.collapse_traits {
        collapse_traits(&mut events);
    }
    if config.verbose {
        sort_by_generated(&mut events);
    }

    let index = IdentityIndex::build(identity).await?;
    let resolution = decode_ids(&index, &mut events);

    let path = config.outdir.join(config.window.report_file_name());
    let path = write_report(&path, &events).await?;
    info!("Wrote {} events to {}", events.len(), path.display());

    Ok(ReportOutcome {
        path,
        events: events.len(),
        resolution,
    })
}
