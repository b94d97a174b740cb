//! Collaborator ports
//!
//! The OpenStack services are opaque data sources. Each one sits behind a
//! trait so the collectors can run against the real REST/DB clients or the
//! in-memory stubs from the devkit.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::model::{Event, HypervisorRecord, TimeWindow};

/// Event type that is always excluded from reports
pub const NOISE_EVENT_TYPE: &str = "compute.metrics.update";

/// Periodic state event excluded by `--nostate`
pub const STATE_EVENT_TYPE: &str = "compute.instance.exists";

#[derive(Debug, Clone, Deserialize)]
pub struct Domain {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub domain_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// Identity service listings (Keystone)
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn list_domains(&self) -> Result<Vec<Domain>>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Users are listed per domain
    async fn list_users(&self, domain_id: &str) -> Result<Vec<User>>;
}

/// Compute inventory service (Nova)
#[async_trait]
pub trait HypervisorInventory: Send + Sync {
    /// Detailed hypervisor listing, as returned by the service
    async fn list_hypervisors(&self) -> Result<Vec<HypervisorRecord>>;
}

/// Event types excluded from a collection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusions {
    event_types: Vec<String>,
}

impl Exclusions {
    /// The noise type followed by the configured skip list, without duplicates
    pub fn new<I, S>(skip: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut event_types = vec![NOISE_EVENT_TYPE.to_string()];
        for s in skip {
            let s = s.into();
            if !event_types.contains(&s) {
                event_types.push(s);
            }
        }
        Self { event_types }
    }

    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }

    pub fn excludes(&self, event_type: &str) -> bool {
        self.event_types.iter().any(|e| e == event_type)
    }
}

impl Default for Exclusions {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

/// Usage/audit event source (database or REST query interface)
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &'static str;

    async fn fetch(&self, window: &TimeWindow, exclusions: &Exclusions) -> Result<Vec<Event>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusions_always_contain_noise() {
        let exclusions = Exclusions::default();
        assert_eq!(exclusions.event_types(), &[NOISE_EVENT_TYPE.to_string()]);

        let exclusions = Exclusions::new([STATE_EVENT_TYPE, NOISE_EVENT_TYPE, STATE_EVENT_TYPE]);
        assert_eq!(exclusions.event_types().len(), 2);
        assert!(exclusions.excludes(STATE_EVENT_TYPE));
        assert!(!exclusions.excludes("compute.instance.create.end"));
    }
}
