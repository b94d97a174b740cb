//! StackLedger core - shared building blocks for the OpenStack collectors
//!
//! This crate provides:
//! - The persisted data model (hypervisor snapshots, events, traits)
//! - Collaborator ports for the identity, compute and event services
//! - OpenStack credentials from the environment and a Keystone v3 session
//! - Identity resolution of user/project/domain identifiers
//! - Sorted, pretty-printed JSON report writing
//! - Logging bootstrap shared by the binaries

pub mod config;
pub mod env;
pub mod error;
pub mod identity;
pub mod keystone;
pub mod logging;
pub mod model;
pub mod output;
pub mod ports;

pub use env::OsCredentials;
pub use error::{LedgerError, Result};
pub use identity::{decode_ids, IdentityIndex, ResolutionReport, UNKNOWN};
pub use keystone::KeystoneSession;
pub use model::{
    Event, HypervisorId, HypervisorRecord, HypervisorSnapshot, TimeWindow, Trait, TraitType,
};
pub use ports::{EventSource, Exclusions, HypervisorInventory, IdentityDirectory};
