use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::{DocumentInventoryManifest, ExtractRunManifest};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let inventory_path = manifest_dir.join("document_inventory.json");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: DocumentInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            document_count = inventory.document_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    match latest_extract_manifest(&manifest_dir)? {
        Some(path) => {
            let manifest: ExtractRunManifest = read_json(&path)?;
            info!(
                run_id = %manifest.run_id,
                status = %manifest.status,
                started_at = %manifest.started_at,
                documents = manifest.counts.processed_document_count,
                sections_located = manifest.counts.sections_located_count,
                sections_absent = manifest.counts.sections_absent_count,
                rows = manifest.counts.rows_emitted_count,
                rows_empty_value = manifest.counts.rows_empty_value_count,
                tables_written = manifest.counts.tables_written_count,
                warning_count = manifest.warnings.len(),
                "loaded latest extract run manifest"
            );
        }
        None => {
            warn!(path = %manifest_dir.display(), "no extract run manifest found");
        }
    }

    Ok(())
}

/// Run manifests embed a sortable compact timestamp in the filename, so the
/// lexicographically greatest one is the most recent run.
fn latest_extract_manifest(
    manifest_dir: &std::path::Path,
) -> Result<Option<std::path::PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with("extract_run_") && name.ends_with(".json") {
            candidates.push(path);
        }
    }

    candidates.sort();
    Ok(candidates.pop())
}
