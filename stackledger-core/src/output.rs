//! JSON report writing
//!
//! Reports are pretty-printed with two-space indentation, `", "`/`": "`
//! separators and keys sorted at every depth, so successive files diff cleanly.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

/// Recursively rebuild every object with its keys in sorted order
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Render a document the way reports are persisted
pub fn render_sorted<T: Serialize + ?Sized>(document: &T) -> Result<String> {
    let value = sort_keys(serde_json::to_value(document)?);
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Write a report, going through a temporary file in the same directory
pub async fn write_report<T: Serialize + ?Sized>(path: &Path, document: &T) -> Result<PathBuf> {
    let content = render_sorted(document)?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = parent {
        tokio::fs::create_dir_all(dir).await?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    tokio::fs::write(&temp_path, content).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    info!("Wrote {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_sorted_nested() {
        let doc = json!({"b": 1, "a": [{"z": true, "y": null}]});
        let rendered = render_sorted(&doc).unwrap();
        assert_eq!(
            rendered,
            "{\n  \"a\": [\n    {\n      \"y\": null,\n      \"z\": true\n    }\n  ],\n  \"b\": 1\n}"
        );
    }

    #[tokio::test]
    async fn test_write_report_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        write_report(&path, &json!([{"k": "v"}])).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"k\": \"v\""));
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
