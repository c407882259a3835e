use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::model::{DocumentEntry, DocumentInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.cache_root)?;

    if args.dry_run {
        info!(
            document_count = manifest.document_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.cache_root
            .join("manifests")
            .join("document_inventory.json")
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(document_count = manifest.document_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(cache_root: &Path) -> Result<DocumentInventoryManifest> {
    let mut paths = discover_documents(cache_root)?;
    paths.sort();

    if paths.is_empty() {
        bail!("no proposal documents found in {}", cache_root.display());
    }

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        let kind = document_kind(&path)
            .with_context(|| format!("unsupported document type: {}", path.display()))?;
        let sha256 = sha256_file(&path)?;

        documents.push(DocumentEntry {
            filename,
            kind: kind.to_string(),
            sha256,
        });
    }

    documents.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(DocumentInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: cache_root.display().to_string(),
        document_count: documents.len(),
        documents,
    })
}

/// Proposal documents arrive as rendered PDFs or as pre-linearized text
/// dumps; anything else is not inventoried.
pub fn document_kind(path: &Path) -> Option<&'static str> {
    let extension = path.extension().and_then(|ext| ext.to_str())?;

    if extension.eq_ignore_ascii_case("pdf") {
        Some("pdf")
    } else if extension.eq_ignore_ascii_case("txt") {
        Some("text")
    } else {
        None
    }
}

fn discover_documents(cache_root: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    let entries = fs::read_dir(cache_root)
        .with_context(|| format!("failed to read {}", cache_root.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", cache_root.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        if document_kind(&path).is_some() {
            documents.push(path);
        }
    }

    Ok(documents)
}
