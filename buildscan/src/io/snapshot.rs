//! JSON snapshot of a finished scan, for re-rendering without a browser.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::aggregate::Aggregate;
use crate::io::report::ReportMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: ReportMeta,
    pub aggregate: Aggregate,
}

/// Atomically write a snapshot (temp file + rename).
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(snapshot).context("serialize snapshot")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::{
        ModelCatalog, ModelEntry, Slot, StateEntry, ThemeEntry, ValidationField, WorkflowEntry,
    };
    use crate::core::skip::SkipReason;

    #[test]
    fn snapshot_survives_disk_with_skips_and_sparse_blocks() {
        let mut state = StateEntry {
            display_name: "Submitted".to_string(),
            internal_name: "submitted".to_string(),
            ..StateEntry::default()
        };
        state.set_validation_block(
            ValidationField::DraftBeforeValidation,
            Some("validate_budget".to_string()),
        );
        let theme = ThemeEntry {
            views: vec!["Gallery".to_string(), "Gallery".to_string()],
            code: Some(Slot::Skipped(SkipReason::timed_out(
                "config modal",
                std::time::Duration::from_secs(10),
            ))),
            workflow: Some(Slot::Collected(WorkflowEntry {
                workflow_id: Some(7),
                states: vec![state],
                skipped: Vec::new(),
            })),
        };
        let mut aggregate = Aggregate::default();
        aggregate.insert_model(
            "Grants".to_string(),
            ModelEntry {
                catalog: ModelCatalog::new("grants", None, "MacModelTypeDyn"),
                themes: [("Decision".to_string(), theme)].into_iter().collect(),
                methods: None,
            },
        );
        let snapshot = Snapshot {
            meta: ReportMeta {
                instance_url: "https://acme.fluxx.io/".to_string(),
                client: "acme.fluxx.io".to_string(),
                generated_at: "2026-01-02 03:04:05".to_string(),
                passes: vec!["catalog".to_string()],
            },
            aggregate,
        };

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("scan.json");
        write_snapshot(&path, &snapshot).expect("write");
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = load_snapshot(&path).expect("load");
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn load_reports_the_offending_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ not json").expect("write");
        let err = load_snapshot(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }
}
