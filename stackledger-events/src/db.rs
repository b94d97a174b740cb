//! Direct database event source
//!
//! Reads the Panko (or Ceilometer) event schema over one MySQL connection:
//! - `event` joined to `event_type`, filtered by the epoch window and exclusions
//! - `trait_float`, `trait_int`, `trait_text`, `trait_datetime`, each joined
//!   back to `event` for the same window and unioned with a type tag
//!
//! The two result sets are merged by [`crate::reconcile::attach_traits`].

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Connection, Row};
use stackledger_core::{Event, EventSource, Exclusions, LedgerError, Result, TimeWindow, TraitType};
use tracing::{info, warn};

use crate::config::DbSettings;
use crate::reconcile::{attach_traits, EventRow, TraitRow};

/// Trait tables and the type tag each one carries
const TRAIT_TABLES: &[(&str, TraitType)] = &[
    ("trait_float", TraitType::Float),
    ("trait_int", TraitType::Integer),
    ("trait_text", TraitType::String),
    ("trait_datetime", TraitType::Datetime),
];

fn db_err(err: sqlx::Error) -> LedgerError {
    LedgerError::Database(err.to_string())
}

/// Event query; binds `start`, `end`, then one value per excluded type
pub fn event_query(exclusions: &Exclusions) -> String {
    let placeholders = vec!["?"; exclusions.event_types().len()].join(", ");
    format!(
        "SELECT \
            CAST(e.id AS SIGNED) AS event_id, \
            e.message_id AS message_id, \
            CAST(e.generated AS CHAR) AS generated, \
            et.`desc` AS event_type \
        FROM event e \
        JOIN event_type et ON e.event_type_id = et.id \
        WHERE e.generated >= ? AND e.generated < ? \
        AND et.`desc` NOT IN ({})",
        placeholders
    )
}

/// Trait union query; binds `start`, `end` once per trait table
pub fn trait_query() -> String {
    TRAIT_TABLES
        .iter()
        .map(|(table, kind)| {
            format!(
                "SELECT \
                    CAST(t.event_id AS SIGNED) AS event_id, \
                    t.`key` AS trait_key, \
                    CAST(t.value AS CHAR) AS trait_value, \
                    '{kind}' AS trait_type \
                FROM {table} t \
                JOIN event e ON e.id = t.event_id \
                WHERE e.generated >= ? AND e.generated < ?",
                kind = kind.as_str(),
                table = table
            )
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
}

fn event_row(row: &MySqlRow) -> Result<EventRow> {
    Ok(EventRow {
        event_id: row.try_get("event_id").map_err(db_err)?,
        message_id: row.try_get("message_id").map_err(db_err)?,
        generated: row.try_get("generated").map_err(db_err)?,
        event_type: row.try_get("event_type").map_err(db_err)?,
    })
}

fn trait_row(row: &MySqlRow) -> Result<TraitRow> {
    let trait_type: String = row.try_get("trait_type").map_err(db_err)?;
    Ok(TraitRow {
        event_id: row.try_get("event_id").map_err(db_err)?,
        key: row.try_get("trait_key").map_err(db_err)?,
        value: row.try_get("trait_value").map_err(db_err)?,
        trait_type: trait_type.parse()?,
    })
}

/// Panko database reader
pub struct DbEventSource {
    settings: DbSettings,
}

impl DbEventSource {
    pub fn new(settings: DbSettings) -> Self {
        Self { settings }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.settings.host)
            .port(self.settings.port)
            .username(&self.settings.user)
            .password(&self.settings.password)
            .database(&self.settings.database)
    }

    async fn query_events(
        &self,
        conn: &mut MySqlConnection,
        window: &TimeWindow,
        exclusions: &Exclusions,
    ) -> Result<Vec<EventRow>> {
        let (start, end) = window.epoch_bounds();
        let sql = event_query(exclusions);
        warn!("Event query: {} [{}, {}) excluding {:?}", sql, start, end, exclusions.event_types());

        let mut query = sqlx::query(&sql).bind(start).bind(end);
        for event_type in exclusions.event_types() {
            query = query.bind(event_type.as_str());
        }

        let rows = query.fetch_all(&mut *conn).await.map_err(db_err)?;
        rows.iter().map(event_row).collect()
    }

    async fn query_traits(
        &self,
        conn: &mut MySqlConnection,
        window: &TimeWindow,
    ) -> Result<Vec<TraitRow>> {
        let (start, end) = window.epoch_bounds();
        let sql = trait_query();
        warn!("Trait query: {} [{}, {})", sql, start, end);

        let mut query = sqlx::query(&sql);
        for _ in TRAIT_TABLES {
            query = query.bind(start).bind(end);
        }

        let rows = query.fetch_all(&mut *conn).await.map_err(db_err)?;
        rows.iter().map(trait_row).collect()
    }
}

#[async_trait]
impl EventSource for DbEventSource {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn fetch(&self, window: &TimeWindow, exclusions: &Exclusions) -> Result<Vec<Event>> {
        let mut conn = MySqlConnection::connect_with(&self.connect_options())
            .await
            .map_err(db_err)?;
        info!(
            "Connected to {}@{}:{}/{}",
            self.settings.user, self.settings.host, self.settings.port, self.settings.database
        );

        let events = self.query_events(&mut conn, window, exclusions).await?;
        let traits = self.query_traits(&mut conn, window).await?;
        conn.close().await.map_err(db_err)?;

        info!("Fetched {} events and {} trait rows", events.len(), traits.len());
        let (events, _report) = attach_traits(events, traits);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackledger_core::ports::STATE_EVENT_TYPE;

    #[test]
    fn test_event_query_placeholders() {
        let sql = event_query(&Exclusions::default());
        assert!(sql.contains("NOT IN (?)"));
        assert!(sql.contains("e.generated >= ? AND e.generated < ?"));

        let sql = event_query(&Exclusions::new([STATE_EVENT_TYPE]));
        assert!(sql.contains("NOT IN (?, ?)"));
    }

    #[test]
    fn test_trait_query_unions_all_tables() {
        let sql = trait_query();
        assert_eq!(sql.matches("UNION ALL").count(), 3);
        assert_eq!(sql.matches("?").count(), 8);
        for (table, kind) in TRAIT_TABLES {
            assert!(sql.contains(&format!("FROM {} t", table)));
            assert!(sql.contains(&format!("'{}' AS trait_type", kind.as_str())));
        }
    }
}
