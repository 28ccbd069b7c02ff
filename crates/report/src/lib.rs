use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use utilities_core::{now_utc_rfc3339, ModelCompatibility, INVENTORY_SCHEMA_VERSION};
use utilities_repository::InventorySnapshot;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ReportPaths {
    pub run_id: String,
    pub root: PathBuf,
    pub inventory_json: PathBuf,
    pub run_json: PathBuf,
    pub logs_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct RunMetadata<'a> {
    run_id: String,
    created_at_utc: String,
    inventory_schema_version: &'static str,
    model_identifier: &'a str,
    installable_versions: Vec<&'static str>,
    eligible_installers: Vec<&'a str>,
    meta: Option<Value>,
}

/// Writes `reports/<run id>/{inventory.json,run.json,logs.txt}` under `base`.
pub fn create_report_bundle(
    base: impl AsRef<Path>,
    snapshot: &InventorySnapshot,
    compat: &ModelCompatibility,
    meta: Option<Value>,
    logs: Option<&str>,
) -> Result<ReportPaths> {
    let run_id = Uuid::new_v4().to_string();
    let root = base.as_ref().join("reports").join(&run_id);
    std::fs::create_dir_all(&root).with_context(|| format!("create {}", root.display()))?;

    let inventory_json = root.join("inventory.json");
    let run_json = root.join("run.json");
    let logs_path = root.join("logs.txt");

    let inventory = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(&inventory_json, inventory)
        .with_context(|| format!("write {}", inventory_json.display()))?;

    let run_meta = RunMetadata {
        run_id: run_id.clone(),
        created_at_utc: now_utc_rfc3339(),
        inventory_schema_version: INVENTORY_SCHEMA_VERSION,
        model_identifier: &compat.model_identifier,
        installable_versions: compat.installable_version_numbers(),
        eligible_installers: snapshot
            .installers
            .iter()
            .filter(|installer| installer.can_install)
            .map(|installer| installer.version_name.as_str())
            .collect(),
        meta,
    };
    std::fs::write(&run_json, serde_json::to_string_pretty(&run_meta)?)
        .with_context(|| format!("write {}", run_json.display()))?;

    std::fs::write(&logs_path, logs.unwrap_or(""))
        .with_context(|| format!("write {}", logs_path.display()))?;

    Ok(ReportPaths {
        run_id,
        root,
        inventory_json,
        run_json,
        logs_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use utilities_core::Disk;
    use utilities_repository::ItemRepository;

    #[test]
    fn writes_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ItemRepository::new();
        repo.ingest_disk(&Disk::synthetic());
        let compat = ModelCompatibility::for_model("MacBookPro15,1");

        let paths = create_report_bundle(
            dir.path(),
            &repo.snapshot(),
            &compat,
            Some(serde_json::json!({ "command": "report" })),
            Some("scan=ok"),
        )
        .unwrap();

        assert!(paths.root.starts_with(dir.path().join("reports")));
        let inventory: Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.inventory_json).unwrap()).unwrap();
        assert_eq!(inventory["disks"][0]["device_identifier"], "FakeDisk");

        let run: Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.run_json).unwrap()).unwrap();
        assert_eq!(run["run_id"], paths.run_id.as_str());
        assert_eq!(run["model_identifier"], "MacBookPro15,1");
        assert_eq!(run["installable_versions"][0], "10.14");
        assert_eq!(run["meta"]["command"], "report");
        assert_eq!(std::fs::read_to_string(&paths.logs_path).unwrap(), "scan=ok");
    }

    #[test]
    fn separate_runs_get_separate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = ItemRepository::new().snapshot();
        let compat = ModelCompatibility::for_model("Unknown");
        let first = create_report_bundle(dir.path(), &snapshot, &compat, None, None).unwrap();
        let second = create_report_bundle(dir.path(), &snapshot, &compat, None, None).unwrap();
        assert_ne!(first.root, second.root);
        assert_eq!(std::fs::read_to_string(&first.logs_path).unwrap(), "");
    }
}
