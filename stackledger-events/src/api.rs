//! REST event source (Panko v2 `/v2/events`)
//!
//! The window and exclusions are sent as `q.field` / `q.op` / `q.value`
//! triples. Exclusions use the patched-Panko convention of an `eq` operator
//! with a `!`-prefixed value.

use async_trait::async_trait;
use serde::Serialize;
use stackledger_core::{Event, EventSource, Exclusions, KeystoneSession, Result, TimeWindow};
use tracing::{info, warn};

/// Server-side cap on returned events; nothing past it is fetched
pub const EVENT_LIMIT: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFilter {
    pub field: String,
    pub op: String,
    pub value: String,
}

impl QueryFilter {
    fn new(field: &str, op: &str, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value: value.into(),
        }
    }
}

/// Structured query for a window and its exclusions
pub fn build_query(window: &TimeWindow, exclusions: &Exclusions) -> Vec<QueryFilter> {
    let mut query = vec![
        QueryFilter::new("start_timestamp", "ge", window.raw_start()),
        QueryFilter::new("end_timestamp", "lt", window.raw_end()),
    ];
    for event_type in exclusions.event_types() {
        query.push(QueryFilter::new("event_type", "eq", format!("!{}", event_type)));
    }
    query
}

/// Flatten filters into repeated `q.*` parameters plus the result cap
pub fn query_params(filters: &[QueryFilter]) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(filters.len() * 3 + 1);
    for f in filters {
        params.push(("q.field", f.field.clone()));
        params.push(("q.op", f.op.clone()));
        params.push(("q.value", f.value.clone()));
    }
    params.push(("limit", EVENT_LIMIT.to_string()));
    params
}

/// Panko REST reader
pub struct ApiEventSource {
    session: KeystoneSession,
    base_url: String,
}

impl ApiEventSource {
    pub fn new(session: KeystoneSession) -> Result<Self> {
        let base_url = session.endpoint("event")?;
        Ok(Self { session, base_url })
    }
}

#[async_trait]
impl EventSource for ApiEventSource {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn fetch(&self, window: &TimeWindow, exclusions: &Exclusions) -> Result<Vec<Event>> {
        let filters = build_query(window, exclusions);
        warn!("Event API query: {:?}", filters);

        let url = format!("{}/v2/events", self.base_url);
        let mut events: Vec<Event> = self
            .session
            .get_json(&url, &query_params(&filters), &[])
            .await?;

        if events.len() >= EVENT_LIMIT {
            warn!("Event API returned {} events, the report may be truncated", events.len());
            events.truncate(EVENT_LIMIT);
        }

        info!("Fetched {} events from the event API", events.len());
        Ok(events)
    }
}
