//! Identity resolution for usage events
//!
//! Builds an in-memory index of domains, projects and users once per run
//! and attaches `user_name`, `project_name` and `domain` to every event that
//! carries both a `user_id` and a `project_id`.
//!
//! Policies:
//! - Events without a principal (no `user_id` or no `project_id`) are service
//!   events: they are skipped and left without resolved fields.
//! - Identifiers missing from the index (deleted, cross-domain, stale) resolve
//!   to the [`UNKNOWN`] sentinel.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::keystone::KeystoneSession;
use crate::model::Event;
use crate::ports::{Domain, IdentityDirectory, Project, User};

/// Sentinel for identifiers the identity service does not know about
pub const UNKNOWN: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectEntry {
    pub name: String,
    pub description: Option<String>,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserEntry {
    pub name: String,
}

/// Lookup tables built from the identity service, discarded after the run
#[derive(Debug, Default)]
pub struct IdentityIndex {
    domains: HashMap<String, String>,
    projects: HashMap<String, ProjectEntry>,
    users: HashMap<String, UserEntry>,
}

/// Outcome counts of a resolution pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionReport {
    pub resolved: usize,
    pub without_principal: usize,
    pub unknown_users: usize,
    pub unknown_projects: usize,
}

impl IdentityIndex {
    /// List domains, projects, then each domain's users
    pub async fn build(directory: &dyn IdentityDirectory) -> Result<Self> {
        let domains = directory.list_domains().await?;
        let projects = directory.list_projects().await?;

        let mut users = Vec::new();
        for domain in &domains {
            let listed = directory.list_users(&domain.id).await?;
            debug!("Domain {}: {} users", domain.name, listed.len());
            users.extend(listed);
        }

        let index = Self::from_listings(domains, projects, users);
        info!(
            "Identity index built: {} domains, {} projects, {} users",
            index.domains.len(),
            index.projects.len(),
            index.users.len()
        );
        Ok(index)
    }

    pub fn from_listings(domains: Vec<Domain>, projects: Vec<Project>, users: Vec<User>) -> Self {
        let domains: HashMap<String, String> =
            domains.into_iter().map(|d| (d.id, d.name)).collect();

        let projects = projects
            .into_iter()
            .map(|p| {
                // Top-level projects are parented by their domain
                let domain = p
                    .parent_id
                    .as_ref()
                    .and_then(|id| domains.get(id))
                    .or_else(|| p.domain_id.as_ref().and_then(|id| domains.get(id)))
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN.to_string());
                (
                    p.id,
                    ProjectEntry {
                        name: p.name,
                        description: p.description,
                        domain,
                    },
                )
            })
            .collect();

        let users = users
            .into_iter()
            .map(|u| (u.id, UserEntry { name: u.name }))
            .collect();

        Self {
            domains,
            projects,
            users,
        }
    }

    pub fn domain_name(&self, domain_id: &str) -> Option<&str> {
        self.domains.get(domain_id).map(String::as_str)
    }

    pub fn project(&self, project_id: &str) -> Option<&ProjectEntry> {
        self.projects.get(project_id)
    }

    pub fn user(&self, user_id: &str) -> Option<&UserEntry> {
        self.users.get(user_id)
    }
}

/// A present `null` id is kept as an empty id, which never resolves
fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Attach resolved names to each event carrying top-level `user_id` and
/// `project_id` fields. Ids still held in traits are not looked at.
pub fn decode_ids(index: &IdentityIndex, events: &mut [Event]) -> ResolutionReport {
    let mut report = ResolutionReport::default();

    for event in events.iter_mut() {
        let user_id = event.fields.get("user_id").map(id_string);
        let project_id = event.fields.get("project_id").map(id_string);

        let (Some(user_id), Some(project_id)) = (user_id, project_id) else {
            report.without_principal += 1;
            continue;
        };

        let user_name = match index.user(&user_id) {
            Some(user) => user.name.clone(),
            None => {
                report.unknown_users += 1;
                UNKNOWN.to_string()
            }
        };

        let (project_name, domain) = match index.project(&project_id) {
            Some(project) => (project.name.clone(), project.domain.clone()),
            None => {
                report.unknown_projects += 1;
                (UNKNOWN.to_string(), UNKNOWN.to_string())
            }
        };

        event.fields.insert("user_name".into(), Value::String(user_name));
        event.fields.insert("project_name".into(), Value::String(project_name));
        event.fields.insert("domain".into(), Value::String(domain));
        report.resolved += 1;
    }

    if report.unknown_users > 0 || report.unknown_projects > 0 {
        warn!(
            "Identity resolution substituted {}: {} users, {} projects",
            UNKNOWN, report.unknown_users, report.unknown_projects
        );
    }
    info!(
        "Resolved identities on {} events ({} without user/project)",
        report.resolved, report.without_principal
    );

    report
}

/// Keystone-backed identity listings
pub struct KeystoneDirectory {
    session: KeystoneSession,
    base_url: String,
}

#[derive(Deserialize)]
struct DomainList {
    domains: Vec<Domain>,
}

#[derive(Deserialize)]
struct ProjectList {
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct UserList {
    users: Vec<User>,
}

impl KeystoneDirectory {
    pub fn new(session: KeystoneSession) -> Result<Self> {
        let base_url = session.endpoint("identity")?;
        let base_url = if base_url.ends_with("/v3") {
            base_url
        } else {
            format!("{}/v3", base_url)
        };
        Ok(Self { session, base_url })
    }
}

#[async_trait]
impl IdentityDirectory for KeystoneDirectory {
    async fn list_domains(&self) -> Result<Vec<Domain>> {
        let url = format!("{}/domains", self.base_url);
        let list: DomainList = self.session.get_json(&url, &[], &[]).await?;
        Ok(list.domains)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let url = format!("{}/projects", self.base_url);
        let list: ProjectList = self.session.get_json(&url, &[], &[]).await?;
        Ok(list.projects)
    }

    async fn list_users(&self, domain_id: &str) -> Result<Vec<User>> {
        let url = format!("{}/users", self.base_url);
        let list: UserList = self
            .session
            .get_json(&url, &[("domain_id", domain_id.to_string())], &[])
            .await?;
        Ok(list.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Trait, TraitType};
    use serde_json::json;

    fn index() -> IdentityIndex {
        IdentityIndex::from_listings(
            vec![Domain { id: "d1".into(), name: "Default".into() }],
            vec![
                Project {
                    id: "p1".into(),
                    name: "research".into(),
                    description: Some("Research group".into()),
                    parent_id: Some("d1".into()),
                    domain_id: Some("d1".into()),
                },
                Project {
                    id: "p2".into(),
                    name: "orphan".into(),
                    description: None,
                    parent_id: Some("gone".into()),
                    domain_id: None,
                },
            ],
            vec![User { id: "u1".into(), name: "alice".into() }],
        )
    }

    #[test]
    fn test_project_domain_lookup() {
        let index = index();
        assert_eq!(index.project("p1").unwrap().domain, "Default");
        assert_eq!(index.project("p2").unwrap().domain, UNKNOWN);
        assert_eq!(index.domain_name("d1"), Some("Default"));
    }

    #[test]
    fn test_decode_known_ids() {
        let mut events = vec![Event::new("m1", "g", "t")
            .with_field("user_id", "u1")
            .with_field("project_id", "p1")];
        let report = decode_ids(&index(), &mut events);

        assert_eq!(report.resolved, 1);
        assert_eq!(events[0].fields["user_name"], json!("alice"));
        assert_eq!(events[0].fields["project_name"], json!("research"));
        assert_eq!(events[0].fields["domain"], json!("Default"));
    }

    #[test]
    fn test_deleted_user_is_unknown() {
        let mut events = vec![Event::new("m1", "g", "t")
            .with_field("user_id", "deleted-user")
            .with_field("project_id", "p1")];
        let report = decode_ids(&index(), &mut events);

        assert_eq!(report.unknown_users, 1);
        assert_eq!(events[0].fields["user_name"], json!(UNKNOWN));
        assert_eq!(events[0].fields["project_name"], json!("research"));
    }

    #[test]
    fn test_unknown_project_defaults_domain() {
        let mut events = vec![Event::new("m1", "g", "t")
            .with_field("user_id", "u1")
            .with_field("project_id", "nope")];
        decode_ids(&index(), &mut events);
        assert_eq!(events[0].fields["project_name"], json!(UNKNOWN));
        assert_eq!(events[0].fields["domain"], json!(UNKNOWN));
    }

    #[test]
    fn test_missing_principal_is_skipped() {
        let mut events = vec![
            Event::new("m1", "g", "t").with_field("project_id", "p1"),
            Event::new("m2", "g", "t").with_field("user_id", "u1"),
        ];
        let report = decode_ids(&index(), &mut events);

        assert_eq!(report.without_principal, 2);
        assert!(events.iter().all(|e| !e.fields.contains_key("user_name")));
        assert!(events.iter().all(|e| !e.fields.contains_key("domain")));
    }

    #[test]
    fn test_ids_in_traits_are_not_resolved() {
        let mut events = vec![Event::new("m1", "g", "t")
            .with_trait(Trait::new(TraitType::String, "user_id", "u1"))
            .with_trait(Trait::new(TraitType::String, "project_id", "p1"))];
        let report = decode_ids(&index(), &mut events);

        assert_eq!(report.without_principal, 1);
        assert!(!events[0].fields.contains_key("user_name"));
        assert!(!events[0].fields.contains_key("project_name"));
        assert!(!events[0].fields.contains_key("domain"));
    }

    #[test]
    fn test_null_user_id_is_unknown() {
        let mut events = vec![Event::new("m1", "g", "t")
            .with_field("user_id", Value::Null)
            .with_field("project_id", "p1")];
        let report = decode_ids(&index(), &mut events);

        assert_eq!(report.resolved, 1);
        assert_eq!(report.unknown_users, 1);
        assert_eq!(events[0].fields["user_name"], json!(UNKNOWN));
        assert_eq!(events[0].fields["project_name"], json!("research"));
    }
}
