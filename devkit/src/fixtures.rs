/*!
Builders de données de test

Construit des hyperviseurs et des événements normalisés conformes au modèle
persisté, sans passer par un service réel.
*/

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use stackledger_core::model::WINDOW_FORMAT;
use stackledger_core::{Event, HypervisorId, HypervisorRecord, Trait, TraitType};

/// Horodatage UTC depuis "YYYY-MM-DDTHH:MM:SS"
pub fn at(stamp: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(stamp, WINDOW_FORMAT)
        .expect("fixture timestamp must match YYYY-MM-DDTHH:MM:SS")
        .and_utc()
}

pub fn hypervisor(id: i64, hostname: &str, vcpus: u64, memory_mb: u64) -> HypervisorRecord {
    HypervisorRecord {
        id: HypervisorId::Numeric(id),
        hostname: hostname.into(),
        vcpu_count: vcpus,
        memory_mb,
    }
}

/// Builder fluide pour événements de test
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new(event_type: &str) -> Self {
        Self {
            event: Event::new(
                format!("msg-{}", event_type),
                "2023-01-01T00:00:00.000000",
                event_type,
            ),
        }
    }

    pub fn message_id(mut self, id: &str) -> Self {
        self.event.message_id = id.into();
        self
    }

    pub fn generated(mut self, generated: &str) -> Self {
        self.event.generated_at = generated.into();
        self
    }

    pub fn db_id(mut self, id: i64) -> Self {
        self.event.event_id = Some(id);
        self
    }

    pub fn float_trait(self, name: &str, value: f64) -> Self {
        self.with_trait(TraitType::Float, name, value.into())
    }

    pub fn int_trait(self, name: &str, value: i64) -> Self {
        self.with_trait(TraitType::Integer, name, value.into())
    }

    pub fn string_trait(self, name: &str, value: &str) -> Self {
        self.with_trait(TraitType::String, name, value.into())
    }

    pub fn datetime_trait(self, name: &str, value: &str) -> Self {
        self.with_trait(TraitType::Datetime, name, value.into())
    }

    /// Ajoute `user_id` et `project_id` comme champs de premier niveau
    /// (forme d'un événement API ou d'un événement aplati)
    pub fn principal(mut self, user_id: &str, project_id: &str) -> Self {
        self.event = self
            .event
            .with_field("user_id", user_id)
            .with_field("project_id", project_id);
        self
    }

    fn with_trait(mut self, kind: TraitType, name: &str, value: Value) -> Self {
        self.event = self.event.with_trait(Trait::new(kind, name, value));
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}
