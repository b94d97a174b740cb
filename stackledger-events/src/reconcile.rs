//! Trait reconciliation
//!
//! Handles:
//! - Typing the raw trait rows read from the four trait tables
//! - Attaching trait rows to their parent event by database id
//! - Collapsing traits into top-level event fields
//!
//! Policies:
//! - A trait whose event id is not among the fetched events (the two queries
//!   raced, or the event was filtered out) is dropped and counted, never
//!   attached to a made-up event.
//! - Only `launched_at` and `deleted_at` are rendered as timestamps; other
//!   datetime traits keep the source's raw value.

use chrono::DateTime;
use serde_json::{Number, Value};
use stackledger_core::{Event, Trait, TraitType};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Trait names rendered as ISO timestamps
pub const DATETIME_TRAITS: &[&str] = &["launched_at", "deleted_at"];

/// Rendering of epoch timestamps in reports
pub const EVENT_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One row of the `event` / `event_type` join
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub event_id: i64,
    pub message_id: String,
    pub generated: Option<String>,
    pub event_type: String,
}

/// One row of the trait union, tagged with its source table's type
#[derive(Debug, Clone, PartialEq)]
pub struct TraitRow {
    pub event_id: i64,
    pub key: String,
    pub value: Option<String>,
    pub trait_type: TraitType,
}

/// Trait attachment counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub events: usize,
    pub attached: usize,
    pub orphaned: usize,
}

/// Render an epoch (seconds, possibly fractional) as a UTC timestamp.
///
/// Values that are not numeric are returned unchanged; some rows already
/// hold a formatted timestamp.
pub fn convert_ts(raw: &str) -> String {
    let Ok(seconds) = raw.trim().parse::<f64>() else {
        return raw.to_string();
    };
    if !seconds.is_finite() {
        return raw.to_string();
    }

    let micros = (seconds * 1_000_000.0).round() as i64;
    match DateTime::from_timestamp_micros(micros) {
        Some(ts) => ts.format(EVENT_TS_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

impl TraitRow {
    /// Type the textual column value according to the trait's table
    pub fn to_trait(&self) -> Trait {
        let value = match &self.value {
            None => Value::Null,
            Some(raw) => typed_value(self.trait_type, &self.key, raw),
        };
        Trait::new(self.trait_type, self.key.clone(), value)
    }
}

fn typed_value(kind: TraitType, name: &str, raw: &str) -> Value {
    if DATETIME_TRAITS.contains(&name) {
        return Value::String(convert_ts(raw));
    }

    match kind {
        TraitType::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        TraitType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        TraitType::String | TraitType::Datetime => Value::String(raw.to_string()),
    }
}

impl EventRow {
    fn into_event(self) -> Event {
        let generated = self.generated.as_deref().map(convert_ts).unwrap_or_default();
        Event::new(self.message_id, generated, self.event_type).with_db_id(self.event_id)
    }
}

/// Join trait rows onto their parent events by event id.
///
/// Events come back in event-id order; orphan traits are dropped.
pub fn attach_traits(events: Vec<EventRow>, traits: Vec<TraitRow>) -> (Vec<Event>, MergeReport) {
    let mut index: BTreeMap<i64, Event> = events
        .into_iter()
        .map(|row| (row.event_id, row.into_event()))
        .collect();

    let mut report = MergeReport {
        events: index.len(),
        ..MergeReport::default()
    };

    for row in traits {
        match index.get_mut(&row.event_id) {
            Some(event) => {
                event.traits.get_or_insert_with(Vec::new).push(row.to_trait());
                report.attached += 1;
            }
            None => {
                debug!("Dropping trait '{}' of unknown event {}", row.key, row.event_id);
                report.orphaned += 1;
            }
        }
    }

    if report.orphaned > 0 {
        warn!(
            "Dropped {} traits without a matching event ({} attached)",
            report.orphaned, report.attached
        );
    }

    (index.into_values().collect(), report)
}

/// Move every trait to a top-level field and drop a non-empty `traits` list.
///
/// Traits sharing a name overwrite each other in encounter order. An empty
/// list is left in place.
pub fn collapse_traits(events: &mut [Event]) {
    for event in events.iter_mut() {
        if event.traits().is_empty() {
            continue;
        }
        if let Some(traits) = event.traits.take() {
            for t in traits {
                event.fields.insert(t.name, t.value);
            }
        }
    }
}

/// Order by `generated` so verbose reports diff cleanly
pub fn sort_by_generated(events: &mut [Event]) {
    events.sort_by(|a, b| a.generated_at.cmp(&b.generated_at));
}
