use anyhow::{Result, bail};

use super::table::TableSchema;

/// Declared precedence of an extraction pass; a primary pass's non-empty
/// cell beats a fallback pass's, regardless of encounter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrustLevel {
    Primary,
    Fallback,
}

#[derive(Debug)]
pub(crate) struct ExtractionPass {
    pub(crate) rows: Vec<Vec<String>>,
    pub(crate) trust: TrustLevel,
}

#[derive(Debug, Default)]
pub(crate) struct MergeCounters {
    pub(crate) malformed_keys_dropped: usize,
    pub(crate) conflicting_cells_overridden: usize,
    pub(crate) duplicate_keys_folded: usize,
}

#[derive(Debug)]
struct MergedRow {
    sort_key: Option<i64>,
    cells: Vec<String>,
    // (pass ordinal, trust) that produced each non-empty cell
    sources: Vec<Option<(usize, TrustLevel)>>,
}

/// Combines rows from independent extraction passes over the same section,
/// keyed by the schema's natural key. Per column the first non-empty value
/// in pass order wins, except that a primary pass overrides a cell a
/// fallback pass produced; duplicate keys within one pass fold with
/// last-write-wins. Rows whose key fails the declared shape are dropped and
/// counted, never raised.
pub(crate) fn reconcile(
    schema: &TableSchema,
    passes: &[ExtractionPass],
) -> Result<(Vec<Vec<String>>, MergeCounters)> {
    let Some(key) = schema.natural_key else {
        bail!("schema '{}' reconciles without a natural key", schema.id);
    };
    let Some(key_index) = schema.column_index(key.column) else {
        bail!("schema '{}' natural key column '{}' missing", schema.id, key.column);
    };

    let mut counters = MergeCounters::default();
    let mut merged: Vec<MergedRow> = Vec::new();

    for (ordinal, pass) in passes.iter().enumerate() {
        for row in &pass.rows {
            let raw_key = row.get(key_index).map(|cell| cell.trim()).unwrap_or("");
            if raw_key.is_empty() {
                counters.malformed_keys_dropped += 1;
                continue;
            }

            let sort_key = if key.numeric {
                match raw_key.parse::<i64>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        counters.malformed_keys_dropped += 1;
                        continue;
                    }
                }
            } else {
                None
            };

            let existing = merged
                .iter_mut()
                .find(|candidate| candidate.cells[key_index].trim() == raw_key);

            let Some(target) = existing else {
                let mut cells = row.clone();
                cells.resize(schema.columns.len(), String::new());
                let sources = cells
                    .iter()
                    .map(|cell| (!cell.is_empty()).then_some((ordinal, pass.trust)))
                    .collect();
                merged.push(MergedRow { sort_key, cells, sources });
                continue;
            };

            counters.duplicate_keys_folded += 1;
            for (index, value) in row.iter().enumerate() {
                if index == key_index || index >= target.cells.len() || value.is_empty() {
                    continue;
                }

                let take = match target.sources[index] {
                    None => true,
                    Some((source_ordinal, _)) if source_ordinal == ordinal => true,
                    Some((_, TrustLevel::Fallback)) if pass.trust == TrustLevel::Primary => {
                        counters.conflicting_cells_overridden += 1;
                        true
                    }
                    Some(_) => false,
                };

                if take {
                    target.cells[index] = value.clone();
                    target.sources[index] = Some((ordinal, pass.trust));
                }
            }
        }
    }

    if key.numeric {
        merged.sort_by_key(|row| row.sort_key.unwrap_or(i64::MAX));
    }

    Ok((merged.into_iter().map(|row| row.cells).collect(), counters))
}
