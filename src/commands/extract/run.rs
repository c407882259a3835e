use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::commands::inventory;
use crate::model::{
    DocumentEntry, DocumentInventoryManifest, ExtractCounts, ExtractPaths, ExtractRunManifest,
    TablesArtifact, ToolVersions,
};
use crate::util::{
    capture_tool_version, ensure_directory, now_utc_string, sha256_file, utc_compact_string,
    write_json_pretty,
};

use super::catalog::{self, SectionConfig};
use super::merge::{ExtractionPass, TrustLevel, reconcile};
use super::rows::{RowScanner, ScanCounters, extract_grid_rows};
use super::section::locate_sections;
use super::source::{DocumentText, LineSource};
use super::table::{Table, assemble_table};

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("document_inventory.json"));
    let extract_manifest_path = args.extract_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("extract_run_{}.json", utc_compact_string(started_ts)))
    });
    let tables_dir = args
        .tables_dir
        .clone()
        .unwrap_or_else(|| cache_root.join("tables"));
    ensure_directory(&tables_dir)?;

    info!(cache_root = %cache_root.display(), run_id = %run_id, "starting extract");

    let configs = selected_configs(&args.sections)?;
    let scanner = RowScanner::new()?;
    let line_source = LineSource::new()?;

    let documents = collect_documents(&args, &cache_root, &inventory_manifest_path)?;

    let mut counts = ExtractCounts::default();
    let mut warnings = Vec::<String>::new();
    counts.document_count = documents.len();

    for (path, entry) in &documents {
        let document = line_source.load(path, args.text_mode);
        warnings.extend(document.warnings.iter().cloned());
        if document.lines.is_empty() {
            counts.empty_document_count += 1;
            warn!(document = %entry.filename, "no text lines extracted");
        }

        let tables = extract_document_tables(&scanner, &configs, &document, &mut counts)?;
        let row_total: usize = tables.iter().map(|table| table.rows.len()).sum();

        let artifact = TablesArtifact {
            manifest_version: 1,
            document: entry.filename.clone(),
            generated_at: now_utc_string(),
            tables: tables.into_iter().map(Table::into_artifact).collect(),
        };
        let artifact_path = tables_dir.join(format!("tables_{}.json", file_stem(path)));
        write_json_pretty(&artifact_path, &artifact)?;

        counts.tables_written_count += artifact.tables.len();
        counts.processed_document_count += 1;
        info!(
            document = %entry.filename,
            tables = artifact.tables.len(),
            rows = row_total,
            "extracted document"
        );
    }

    let updated_at = now_utc_string();
    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at,
        command: render_extract_command(&args),
        tool_versions: ToolVersions {
            pdftotext: capture_tool_version("pdftotext"),
        },
        paths: ExtractPaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            tables_dir: tables_dir.display().to_string(),
        },
        counts,
        source_hashes: documents.into_iter().map(|(_, entry)| entry).collect(),
        warnings,
        notes: vec![
            "Extraction reads the pdftotext text layer; absent sections yield empty tables."
                .to_string(),
            "Vehicle schedules reconcile a layout-grid primary pass with a sequential fallback scan."
                .to_string(),
        ],
    };

    write_json_pretty(&extract_manifest_path, &manifest)?;

    info!(path = %extract_manifest_path.display(), "wrote extract run manifest");
    info!(
        documents = manifest.counts.processed_document_count,
        rows = manifest.counts.rows_emitted_count,
        "extract completed"
    );

    Ok(())
}

/// One pure pass per configured schedule: locate every occurrence, rebuild
/// rows, and reconcile keyed schedules across the grid and scan passes. An
/// absent section produces an explicit zero-row table.
pub(crate) fn extract_document_tables(
    scanner: &RowScanner,
    configs: &[SectionConfig],
    document: &DocumentText,
    counts: &mut ExtractCounts,
) -> Result<Vec<Table>> {
    let mut tables = Vec::with_capacity(configs.len());

    for cfg in configs {
        let sections = locate_sections(&document.lines, cfg);
        if sections.is_empty() {
            counts.sections_absent_count += 1;
            tables.push(Table::empty(&cfg.schema));
            continue;
        }

        counts.sections_located_count += sections.len();
        if sections.len() > 1 {
            counts.repeated_section_count += sections.len() - 1;
        }

        let mut scan_counters = ScanCounters::default();
        let mut scan_rows = Vec::new();
        for section in &sections {
            let scan = scanner.reconstruct(cfg, section);
            scan_counters.absorb(&scan.counters);
            scan_rows.extend(scan.rows);
        }
        absorb_scan_counters(counts, &scan_counters);
        counts.scan_pass_row_count += scan_rows.len();

        let table = if cfg.schema.natural_key.is_some() {
            let mut passes = Vec::new();
            if let Some(grid_spec) = &cfg.grid {
                let grid_rows = extract_grid_rows(&document.grid, cfg, grid_spec);
                if !grid_rows.is_empty() {
                    counts.grid_pass_row_count += grid_rows.len();
                    passes.push(ExtractionPass {
                        rows: grid_rows,
                        trust: TrustLevel::Primary,
                    });
                }
            }
            let scan_trust = if passes.is_empty() {
                TrustLevel::Primary
            } else {
                TrustLevel::Fallback
            };
            passes.push(ExtractionPass {
                rows: scan_rows,
                trust: scan_trust,
            });

            let (mut rows, merge_counters) = reconcile(&cfg.schema, &passes)?;
            counts.malformed_key_dropped_count += merge_counters.malformed_keys_dropped;
            counts.conflicting_cell_override_count += merge_counters.conflicting_cells_overridden;
            counts.duplicate_key_fold_count += merge_counters.duplicate_keys_folded;
            counts.vin_relocation_count += scanner.relocate_vins(cfg, &mut rows);
            assemble_table(&cfg.schema, rows, cfg.value_shift.as_ref())
        } else {
            assemble_table(&cfg.schema, scan_rows, cfg.value_shift.as_ref())
        };

        tables.push(table);
    }

    Ok(tables)
}

fn selected_configs(requested: &[String]) -> Result<Vec<SectionConfig>> {
    let configs = catalog::builtin()?;
    if requested.is_empty() {
        return Ok(configs);
    }

    let mut selected = Vec::with_capacity(requested.len());
    for name in requested {
        let Some(config) = configs.iter().find(|config| config.schema.id == name) else {
            let known: Vec<&str> = configs.iter().map(|config| config.schema.id).collect();
            bail!("unknown section '{}', expected one of: {}", name, known.join(", "));
        };
        selected.push(config.clone());
    }

    Ok(selected)
}

fn collect_documents(
    args: &ExtractArgs,
    cache_root: &Path,
    inventory_manifest_path: &Path,
) -> Result<Vec<(PathBuf, DocumentEntry)>> {
    if let Some(input) = &args.input {
        let filename = input
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid input filename: {}", input.display()))?;
        let kind = inventory::document_kind(input)
            .with_context(|| format!("unsupported input document: {}", input.display()))?;
        let sha256 = sha256_file(input)?;

        return Ok(vec![(
            input.clone(),
            DocumentEntry {
                filename,
                kind: kind.to_string(),
                sha256,
            },
        )]);
    }

    let inventory = load_or_refresh_inventory(
        cache_root,
        inventory_manifest_path,
        args.refresh_inventory,
    )?;

    Ok(inventory
        .documents
        .into_iter()
        .map(|entry| (cache_root.join(&entry.filename), entry))
        .collect())
}

fn load_or_refresh_inventory(
    cache_root: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
) -> Result<DocumentInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(cache_root)?;
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            document_count = manifest.document_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let raw = fs::read(inventory_manifest_path)
        .with_context(|| format!("failed to read {}", inventory_manifest_path.display()))?;
    let manifest: DocumentInventoryManifest = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", inventory_manifest_path.display()))?;

    info!(
        path = %inventory_manifest_path.display(),
        document_count = manifest.document_count,
        "loaded existing inventory manifest"
    );

    Ok(manifest)
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = format!(
        "propex extract --cache-root {} --text-mode {}",
        args.cache_root.display(),
        args.text_mode.as_str()
    );

    if let Some(input) = &args.input {
        command.push_str(&format!(" --input {}", input.display()));
    }
    if args.refresh_inventory {
        command.push_str(" --refresh-inventory");
    }
    for section in &args.sections {
        command.push_str(&format!(" --section {section}"));
    }

    command
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document")
        .to_string()
}

fn absorb_scan_counters(counts: &mut ExtractCounts, counters: &ScanCounters) {
    counts.rows_emitted_count += counters.rows_emitted;
    counts.rows_empty_value_count += counters.rows_empty_value;
    counts.continuation_merge_count += counters.continuation_merges;
    counts.currency_rejoin_count += counters.currency_rejoins;
    counts.back_reference_split_count += counters.back_reference_splits;
    counts.vin_relocation_count += counters.vin_relocations;
    counts.header_lines_skipped_count += counters.header_lines_skipped;
    counts.unbound_token_count += counters.unbound_tokens;
}
