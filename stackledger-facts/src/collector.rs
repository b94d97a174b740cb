//! Hypervisor fact collection
//!
//! Reads the compute service's detailed hypervisor listing and stamps it with
//! the capture time. No filtering; whatever the service returns is recorded.

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use stackledger_core::{
    HypervisorInventory, HypervisorRecord, HypervisorSnapshot, KeystoneSession, Result,
};
use tracing::{debug, info};

/// Microversion matching the fields recorded in snapshots
const NOVA_API_VERSION: &str = "2.1";

pub struct FactCollector<'a> {
    inventory: &'a dyn HypervisorInventory,
}

impl<'a> FactCollector<'a> {
    pub fn new(inventory: &'a dyn HypervisorInventory) -> Self {
        Self { inventory }
    }

    /// Collect a snapshot stamped with the current UTC time
    pub async fn collect(&self) -> Result<HypervisorSnapshot> {
        self.collect_at(Utc::now()).await
    }

    pub async fn collect_at(&self, now: DateTime<Utc>) -> Result<HypervisorSnapshot> {
        debug!("Listing hypervisors...");
        let hypervisors = self.inventory.list_hypervisors().await?;
        info!("Fetched {} hypervisors", hypervisors.len());

        // Snapshot timestamps carry whole seconds
        let captured_at = now.with_nanosecond(0).unwrap_or(now);
        Ok(HypervisorSnapshot::new(hypervisors, captured_at))
    }
}

/// Nova-backed inventory
pub struct NovaInventory {
    session: KeystoneSession,
    base_url: String,
}

#[derive(Deserialize)]
struct HypervisorList {
    hypervisors: Vec<HypervisorRecord>,
}

impl NovaInventory {
    pub fn new(session: KeystoneSession) -> Result<Self> {
        let base_url = session.endpoint("compute")?;
        Ok(Self { session, base_url })
    }
}

#[async_trait]
impl HypervisorInventory for NovaInventory {
    async fn list_hypervisors(&self) -> Result<Vec<HypervisorRecord>> {
        let url = format!("{}/os-hypervisors/detail", self.base_url);
        let list: HypervisorList = self
            .session
            .get_json(
                &url,
                &[],
                &[("X-OpenStack-Nova-API-Version", NOVA_API_VERSION)],
            )
            .await?;
        Ok(list.hypervisors)
    }
}
