//! Config-file plumbing shared by the binaries
//!
//! Both tools resolve their settings the same way: built-in defaults, then a
//! JSON config file, then CLI flags. This module locates and reads the file.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{LedgerError, Result};

/// `<user config dir>/stackledger/<tool>.json`, or `./<tool>.json` without one
pub fn default_config_path(tool: &str) -> PathBuf {
    let file = format!("{}.json", tool);
    match dirs::config_dir() {
        Some(mut path) => {
            path.push("stackledger");
            path.push(file);
            path
        }
        None => PathBuf::from(file),
    }
}

/// Read the overrides from a JSON config file; a missing file means no overrides
pub async fn load_overrides<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(T::default());
        }
        Err(e) => {
            return Err(LedgerError::Config(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&content)
        .map_err(|e| LedgerError::Config(format!("invalid config file {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Overrides {
        outdir: Option<String>,
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path("hypervisor_facts");
        assert!(path.to_string_lossy().ends_with("hypervisor_facts.json"));
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let overrides: Overrides = load_overrides(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(overrides, Overrides::default());
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let result: Result<Overrides> = load_overrides(&path).await;
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[tokio::test]
    async fn test_unknown_keys_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"outdir": "/srv/facts", "legacy": 1}"#).unwrap();
        let overrides: Overrides = load_overrides(&path).await.unwrap();
        assert_eq!(overrides.outdir.as_deref(), Some("/srv/facts"));
    }
}
