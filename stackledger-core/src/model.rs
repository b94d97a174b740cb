//! Persisted data model shared by the collectors
//!
//! Field names follow the JSON documents already written by the reporting
//! pipeline (`ts`, `hypervisor_hostname`, `vcpus`, `generated`, `db_id`...),
//! so new files stay diffable against older ones.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{LedgerError, Result};

/// Input format of the reporting window bounds (naive, no zone)
pub const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Capture timestamp format stored inside a snapshot
pub const SNAPSHOT_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Hypervisor identifier: integer on older Nova microversions, UUID on newer ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HypervisorId {
    Numeric(i64),
    Uuid(String),
}

/// One compute node's identity and capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypervisorRecord {
    pub id: HypervisorId,
    #[serde(rename = "hypervisor_hostname")]
    pub hostname: String,
    #[serde(rename = "vcpus")]
    pub vcpu_count: u64,
    pub memory_mb: u64,
}

/// Point-in-time capture of the full hypervisor fact set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypervisorSnapshot {
    #[serde(rename = "ts", with = "snapshot_ts")]
    pub timestamp: DateTime<Utc>,
    pub hypervisors: Vec<HypervisorRecord>,
}

impl HypervisorSnapshot {
    pub fn new(hypervisors: Vec<HypervisorRecord>, captured_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: captured_at,
            hypervisors,
        }
    }
}

mod snapshot_ts {
    use super::SNAPSHOT_TS_FORMAT;
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(SNAPSHOT_TS_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, SNAPSHOT_TS_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

/// Reporting window `[start, end)`, kept alongside the operator's raw input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    raw_start: String,
    raw_end: String,
}

impl TimeWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |value: &str| {
            NaiveDateTime::parse_from_str(value, WINDOW_FORMAT).map_err(|_| {
                LedgerError::InvalidTimestamp {
                    value: value.to_string(),
                    format: WINDOW_FORMAT,
                }
            })
        };

        let window = TimeWindow {
            start: parse(start)?,
            end: parse(end)?,
            raw_start: start.to_string(),
            raw_end: end.to_string(),
        };

        if window.end < window.start {
            return Err(LedgerError::Config(format!(
                "window end {} is before start {}",
                end, start
            )));
        }

        Ok(window)
    }

    pub fn raw_start(&self) -> &str {
        &self.raw_start
    }

    pub fn raw_end(&self) -> &str {
        &self.raw_end
    }

    /// Unix epoch bounds, reading the naive bounds as if they were UTC.
    ///
    /// The event database stores `generated` as an epoch; if the operator's
    /// bounds are meant as local time the window is shifted by the UTC offset.
    pub fn epoch_bounds(&self) -> (i64, i64) {
        (
            self.start.and_utc().timestamp(),
            self.end.and_utc().timestamp(),
        )
    }

    /// Report file name: `<start>_<end>.json`
    pub fn report_file_name(&self) -> String {
        format!("{}_{}.json", self.raw_start, self.raw_end)
    }
}

/// Storage type tag of a trait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraitType {
    Float,
    Integer,
    String,
    Datetime,
}

impl TraitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraitType::Float => "float",
            TraitType::Integer => "integer",
            TraitType::String => "string",
            TraitType::Datetime => "datetime",
        }
    }
}

impl std::str::FromStr for TraitType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "float" => Ok(TraitType::Float),
            "integer" => Ok(TraitType::Integer),
            "string" => Ok(TraitType::String),
            "datetime" => Ok(TraitType::Datetime),
            other => Err(LedgerError::Config(format!("unknown trait type '{}'", other))),
        }
    }
}

/// Typed key/value attribute attached to an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trait {
    #[serde(rename = "type")]
    pub kind: TraitType,
    pub name: String,
    pub value: Value,
}

impl Trait {
    pub fn new(kind: TraitType, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            kind,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Normalized usage/audit event, identical for the DB and API sources.
///
/// `traits` is `None` once traits have been collapsed into `fields`.
/// `fields` also receives the resolved `user_name`, `project_name` and `domain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "db_id", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
    pub message_id: String,
    #[serde(rename = "generated")]
    pub generated_at: String,
    pub event_type: String,
    #[serde(default = "empty_traits", skip_serializing_if = "Option::is_none")]
    pub traits: Option<Vec<Trait>>,
    #[serde(default = "empty_raw")]
    pub raw: Value,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

fn empty_traits() -> Option<Vec<Trait>> {
    Some(Vec::new())
}

fn empty_raw() -> Value {
    Value::Object(Default::default())
}

impl Event {
    pub fn new(
        message_id: impl Into<String>,
        generated_at: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            event_id: None,
            message_id: message_id.into(),
            generated_at: generated_at.into(),
            event_type: event_type.into(),
            traits: empty_traits(),
            raw: empty_raw(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_db_id(mut self, id: i64) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn with_trait(mut self, t: Trait) -> Self {
        self.traits.get_or_insert_with(Vec::new).push(t);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn traits(&self) -> &[Trait] {
        self.traits.as_deref().unwrap_or(&[])
    }
}
