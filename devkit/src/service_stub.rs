/*!
Stubs des services OpenStack pour tests sans cloud

Chaque stub implémente un port de `stackledger-core` et enregistre les appels
reçus, pour vérifier ce que les collecteurs ont demandé.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use stackledger_core::ports::{Domain, Project, User};
use stackledger_core::{
    Event, EventSource, Exclusions, HypervisorInventory, HypervisorRecord, IdentityDirectory,
    LedgerError, Result, TimeWindow,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stub Keystone: domaines, projets et utilisateurs en mémoire
#[derive(Default)]
pub struct StubIdentity {
    domains: Vec<Domain>,
    projects: Vec<Project>,
    users: HashMap<String, Vec<User>>,
    calls: Mutex<Vec<String>>,
}

impl StubIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, id: &str, name: &str) -> Self {
        self.domains.push(Domain {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// Projet de premier niveau, rattaché à son domaine
    pub fn with_project(mut self, id: &str, name: &str, domain_id: &str) -> Self {
        self.projects.push(Project {
            id: id.into(),
            name: name.into(),
            description: Some(format!("{} project", name)),
            parent_id: Some(domain_id.into()),
            domain_id: Some(domain_id.into()),
        });
        self
    }

    pub fn with_user(mut self, domain_id: &str, id: &str, name: &str) -> Self {
        self.users.entry(domain_id.into()).or_default().push(User {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// Appels reçus, dans l'ordre ("domains", "projects", "users:<domain>")
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl IdentityDirectory for StubIdentity {
    async fn list_domains(&self) -> Result<Vec<Domain>> {
        self.record("domains".into());
        Ok(self.domains.clone())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.record("projects".into());
        Ok(self.projects.clone())
    }

    async fn list_users(&self, domain_id: &str) -> Result<Vec<User>> {
        self.record(format!("users:{}", domain_id));
        Ok(self.users.get(domain_id).cloned().unwrap_or_default())
    }
}

/// Stub Nova: inventaire modifiable entre deux exécutions
#[derive(Default)]
pub struct StubInventory {
    hypervisors: Mutex<Vec<HypervisorRecord>>,
    failing: bool,
    calls: AtomicUsize,
}

impl StubInventory {
    pub fn new(hypervisors: Vec<HypervisorRecord>) -> Self {
        Self {
            hypervisors: Mutex::new(hypervisors),
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Simule une panne réseau du service compute
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Remplace l'inventaire (simule un changement d'infrastructure)
    pub fn set_hypervisors(&self, hypervisors: Vec<HypervisorRecord>) {
        *self.hypervisors.lock() = hypervisors;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HypervisorInventory for StubInventory {
    async fn list_hypervisors(&self) -> Result<Vec<HypervisorRecord>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing {
            return Err(LedgerError::Network("stub compute service unreachable".into()));
        }
        Ok(self.hypervisors.lock().clone())
    }
}

/// Stub de source d'événements: applique les exclusions comme le serveur
#[derive(Default)]
pub struct StubEventSource {
    events: Vec<Event>,
    requests: Mutex<Vec<(TimeWindow, Exclusions)>>,
}

impl StubEventSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fenêtres et exclusions reçues par `fetch`
    pub fn requests(&self) -> Vec<(TimeWindow, Exclusions)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl EventSource for StubEventSource {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn fetch(&self, window: &TimeWindow, exclusions: &Exclusions) -> Result<Vec<Event>> {
        self.requests.lock().push((window.clone(), exclusions.clone()));

        Ok(self
            .events
            .iter()
            .filter(|e| !exclusions.excludes(&e.event_type))
            .cloned()
            .collect())
    }
}
