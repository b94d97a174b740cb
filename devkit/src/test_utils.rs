/*!
Test Harness pour les collecteurs StackLedger

Facilite l'écriture de tests avec:
- Répertoire de sortie temporaire, supprimé en fin de test
- Initialisation du logging pour tests
- Lecture des fichiers JSON produits
*/

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Harness de test: un répertoire de sortie isolé par test
pub struct TestHarness {
    outdir: TempDir,
}

impl TestHarness {
    /// Crée un nouveau harness de test
    pub fn new() -> Result<Self> {
        // Init logging pour tests, ignoré si déjà fait
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();

        Ok(Self {
            outdir: tempfile::tempdir().context("Failed to create temp output dir")?,
        })
    }

    pub fn outdir(&self) -> &Path {
        self.outdir.path()
    }

    /// Fichiers du répertoire de sortie dont le nom commence par `prefix`, triés
    pub fn files_with_prefix(&self, prefix: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(self.outdir())? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(prefix) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Snapshots `hypervisor_facts_*.json` écrits jusqu'ici
    pub fn snapshot_files(&self) -> Result<Vec<PathBuf>> {
        self.files_with_prefix("hypervisor_facts_")
    }

    pub fn read_json(&self, path: &Path) -> Result<Value> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Écrit un fichier brut dans le répertoire de sortie (snapshot existant, config...)
    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.outdir().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_basic_functionality() {
        let harness = TestHarness::new().unwrap();
        harness
            .write_file("hypervisor_facts_2023-01-01T00:00:00.json", r#"{"hypervisors": []}"#)
            .unwrap();
        harness.write_file("other.json", "{}").unwrap();

        let snapshots = harness.snapshot_files().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(
            harness.read_json(&snapshots[0]).unwrap()["hypervisors"],
            serde_json::json!([])
        );
    }
}
