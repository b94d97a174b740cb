//! Snapshot deduplication
//!
//! A new snapshot is only worth a file when its hypervisor set differs from the
//! newest snapshot already in the output directory. The comparison ignores
//! key order and list order at every depth.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use stackledger_core::output::write_report;
use stackledger_core::{HypervisorSnapshot, Result};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SNAPSHOT_PREFIX: &str = "hypervisor_facts_";
pub const SNAPSHOT_SUFFIX: &str = ".json";

/// Timestamp embedded in snapshot file names (UTC, no zone suffix)
pub const SNAPSHOT_FILE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// JSON number with a total order; `1` and `1.0` are the same number
#[derive(Debug, Clone, Copy)]
pub struct CanonicalNumber(f64);

impl CanonicalNumber {
    fn new(value: f64) -> Self {
        // -0.0 and 0.0 must compare equal
        if value == 0.0 {
            Self(0.0)
        } else {
            Self(value)
        }
    }
}

impl PartialEq for CanonicalNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CanonicalNumber {}

impl PartialOrd for CanonicalNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Order-insensitive normal form of a JSON value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Canonical {
    Null,
    Bool(bool),
    Number(CanonicalNumber),
    String(String),
    /// Canonicalized elements, sorted
    List(Vec<Canonical>),
    /// Entries sorted by key, values canonicalized
    Map(Vec<(String, Canonical)>),
}

/// Mappings sort by key, sequences sort their canonicalized elements
pub fn canonicalize(value: &Value) -> Canonical {
    match value {
        Value::Null => Canonical::Null,
        Value::Bool(b) => Canonical::Bool(*b),
        Value::Number(n) => Canonical::Number(CanonicalNumber::new(n.as_f64().unwrap_or(f64::NAN))),
        Value::String(s) => Canonical::String(s.clone()),
        Value::Array(items) => {
            let mut list: Vec<Canonical> = items.iter().map(canonicalize).collect();
            list.sort();
            Canonical::List(list)
        }
        Value::Object(map) => {
            let mut entries: Vec<(String, Canonical)> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            entries.sort();
            Canonical::Map(entries)
        }
    }
}

pub fn snapshot_file_name(captured_at: &DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        SNAPSHOT_PREFIX,
        captured_at.format(SNAPSHOT_FILE_FORMAT),
        SNAPSHOT_SUFFIX
    )
}

/// Capture time embedded in a snapshot file name, if it is one
pub fn parse_snapshot_file_name(name: &str) -> Option<NaiveDateTime> {
    let stamp = name
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(SNAPSHOT_SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, SNAPSHOT_FILE_FORMAT).ok()
}

/// Output directory holding the snapshot history
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Newest snapshot file by embedded timestamp
    pub async fn latest_path(&self) -> Result<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut newest: Option<(NaiveDateTime, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(SNAPSHOT_PREFIX) || !name.ends_with(SNAPSHOT_SUFFIX) {
                continue;
            }
            let Some(stamp) = parse_snapshot_file_name(&name) else {
                warn!("Ignoring snapshot with unparsable name: {}", name);
                continue;
            };
            if newest.as_ref().map_or(true, |(best, _)| stamp > *best) {
                newest = Some((stamp, entry.path()));
            }
        }

        Ok(newest.map(|(_, path)| path))
    }

    /// Hypervisor list of the newest snapshot, empty when there is none
    pub async fn latest_hypervisors(&self) -> Result<Value> {
        let Some(path) = self.latest_path().await? else {
            debug!("No prior snapshot in {}", self.dir.display());
            return Ok(Value::Array(Vec::new()));
        };

        debug!("Comparing against {}", path.display());
        let content = tokio::fs::read_to_string(&path).await?;
        let prior: Value = serde_json::from_str(&content)?;

        Ok(prior
            .get("hypervisors")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    /// True when the candidate differs from the newest saved snapshot
    pub async fn is_new_data(&self, candidate: &HypervisorSnapshot) -> Result<bool> {
        let prior = self.latest_hypervisors().await?;
        let current = serde_json::to_value(&candidate.hypervisors)?;

        if canonicalize(&prior) == canonicalize(&current) {
            info!("No new facts found");
            Ok(false)
        } else {
            info!("New facts found");
            Ok(true)
        }
    }

    /// Persist a snapshot under its capture timestamp
    pub async fn write(&self, snapshot: &HypervisorSnapshot) -> Result<PathBuf> {
        let path = self.dir.join(snapshot_file_name(&snapshot.timestamp));
        write_report(&path, snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackledger_core::{HypervisorId, HypervisorRecord};

    fn hv(id: i64, host: &str, vcpus: u64, mem: u64) -> HypervisorRecord {
        HypervisorRecord {
            id: HypervisorId::Numeric(id),
            hostname: host.into(),
            vcpu_count: vcpus,
            memory_mb: mem,
        }
    }

    fn at(stamp: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(stamp, SNAPSHOT_FILE_FORMAT)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_canonicalize_ignores_list_order() {
        let a = json!([{"id": 1, "tags": ["x", "y"]}, {"id": 2, "tags": []}]);
        let b = json!([{"tags": [], "id": 2}, {"tags": ["y", "x"], "id": 1}]);
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn test_canonicalize_detects_value_change() {
        let a = json!([{"id": 1, "vcpus": 32}]);
        let b = json!([{"id": 1, "vcpus": 64}]);
        assert_ne!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn test_canonicalize_numbers() {
        assert_eq!(canonicalize(&json!(1)), canonicalize(&json!(1.0)));
        assert_eq!(canonicalize(&json!(-0.0)), canonicalize(&json!(0)));
        assert_ne!(canonicalize(&json!(1)), canonicalize(&json!("1")));
    }

    #[test]
    fn test_canonicalize_multiset_semantics() {
        // Duplicates count: [a, a, b] is not [a, b, b]
        assert_ne!(
            canonicalize(&json!(["a", "a", "b"])),
            canonicalize(&json!(["a", "b", "b"]))
        );
    }

    #[test]
    fn test_snapshot_file_name_roundtrip() {
        let ts = at("2023-01-01T00:00:00");
        let name = snapshot_file_name(&ts);
        assert_eq!(name, "hypervisor_facts_2023-01-01T00:00:00.json");
        assert_eq!(parse_snapshot_file_name(&name), Some(ts.naive_utc()));
        assert_eq!(parse_snapshot_file_name("hypervisor_facts_latest.json"), None);
        assert_eq!(parse_snapshot_file_name("2023-01-01T00:00:00_2023-01-02T00:00:00.json"), None);
    }

    #[tokio::test]
    async fn test_missing_dir_is_new_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("never-created"));
        let snapshot = HypervisorSnapshot::new(vec![hv(1, "a", 1, 1)], at("2023-01-01T00:00:00"));
        assert!(store.is_new_data(&snapshot).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_inventory_matches_empty_prior() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let snapshot = HypervisorSnapshot::new(vec![], at("2023-01-01T00:00:00"));
        assert!(!store.is_new_data(&snapshot).await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let older = HypervisorSnapshot::new(vec![hv(1, "a", 8, 1024)], at("2023-01-02T00:00:00"));
        let newer = HypervisorSnapshot::new(vec![hv(1, "a", 16, 1024)], at("2023-01-10T00:00:00"));
        store.write(&newer).await.unwrap();
        store.write(&older).await.unwrap();
        std::fs::write(dir.path().join("hypervisor_facts_garbage.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let latest = store.latest_path().await.unwrap().unwrap();
        assert!(latest.ends_with("hypervisor_facts_2023-01-10T00:00:00.json"));

        let candidate =
            HypervisorSnapshot::new(vec![hv(1, "a", 16, 1024)], at("2023-01-11T00:00:00"));
        assert!(!store.is_new_data(&candidate).await.unwrap());
    }

    #[tokio::test]
    async fn test_prior_written_in_other_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hypervisor_facts_2023-01-01T00:00:00.json"),
            r#"{"ts": "2023-01-01T00:00:00Z", "hypervisors": [
                {"vcpus": 4, "memory_mb": 2048, "id": 2, "hypervisor_hostname": "b"},
                {"memory_mb": 1024, "hypervisor_hostname": "a", "id": 1, "vcpus": 2}
            ]}"#,
        )
        .unwrap();

        let store = SnapshotStore::new(dir.path());
        let candidate = HypervisorSnapshot::new(
            vec![hv(1, "a", 2, 1024), hv(2, "b", 4, 2048)],
            at("2023-01-01T01:00:00"),
        );
        assert!(!store.is_new_data(&candidate).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_prior_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hypervisor_facts_2023-01-01T00:00:00.json"),
            "{ truncated",
        )
        .unwrap();
        let store = SnapshotStore::new(dir.path());
        let candidate = HypervisorSnapshot::new(vec![], at("2023-01-01T01:00:00"));
        assert!(store.is_new_data(&candidate).await.is_err());
    }
}
