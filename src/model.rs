use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub filename: String,
    pub kind: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub document_count: usize,
    pub documents: Vec<DocumentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub pdftotext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub inventory_manifest_path: String,
    pub tables_dir: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractCounts {
    pub document_count: usize,
    pub processed_document_count: usize,
    pub empty_document_count: usize,
    pub sections_located_count: usize,
    pub sections_absent_count: usize,
    pub repeated_section_count: usize,
    pub header_lines_skipped_count: usize,
    pub rows_emitted_count: usize,
    pub rows_empty_value_count: usize,
    pub continuation_merge_count: usize,
    pub currency_rejoin_count: usize,
    pub back_reference_split_count: usize,
    pub vin_relocation_count: usize,
    pub unbound_token_count: usize,
    pub scan_pass_row_count: usize,
    pub grid_pass_row_count: usize,
    pub malformed_key_dropped_count: usize,
    pub conflicting_cell_override_count: usize,
    pub duplicate_key_fold_count: usize,
    pub tables_written_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: ExtractPaths,
    pub counts: ExtractCounts,
    pub source_hashes: Vec<DocumentEntry>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableArtifact {
    pub schedule: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesArtifact {
    pub manifest_version: u32,
    pub document: String,
    pub generated_at: String,
    pub tables: Vec<TableArtifact>,
}
