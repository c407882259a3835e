use anyhow::{Result, bail};

use super::classify::Tag;
use crate::model::TableArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnRole {
    /// Accumulating free-text column (coverage name, model, payee). At most
    /// one per schema.
    Description,
    /// Natural-key anchor column for key-anchored row patterns.
    Key,
    /// Classified-value column; binds the next token whose tag is accepted
    /// and whose digit count meets the minimum.
    Value {
        accepts: &'static [Tag],
        min_digits: usize,
    },
    /// Filled only by post-binding rules (VIN excision, context lines,
    /// edition splitting), never by tag binding.
    Derived,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnSpec {
    pub(crate) name: &'static str,
    pub(crate) role: ColumnRole,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NaturalKey {
    pub(crate) column: &'static str,
    pub(crate) numeric: bool,
}

/// Moves `from` into `to` when `to` ends up empty and `from` holds a monetary
/// value; reproduces the trailing-premium correction the proposal layouts
/// need after positional binding.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValueShift {
    pub(crate) from: &'static str,
    pub(crate) to: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TableSchema {
    pub(crate) id: &'static str,
    pub(crate) columns: &'static [ColumnSpec],
    pub(crate) natural_key: Option<NaturalKey>,
}

impl TableSchema {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            bail!("schema '{}' declares zero columns", self.id);
        }

        for (index, column) in self.columns.iter().enumerate() {
            let duplicated = self.columns[..index]
                .iter()
                .any(|other| other.name == column.name);
            if duplicated {
                bail!("schema '{}' declares duplicate column '{}'", self.id, column.name);
            }
        }

        let description_count = self
            .columns
            .iter()
            .filter(|column| matches!(column.role, ColumnRole::Description))
            .count();
        if description_count > 1 {
            bail!("schema '{}' declares more than one description column", self.id);
        }

        if let Some(key) = self.natural_key {
            if self.column_index(key.column).is_none() {
                bail!(
                    "schema '{}' declares natural key on unknown column '{}'",
                    self.id,
                    key.column
                );
            }
        }

        Ok(())
    }

    pub(crate) fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub(crate) fn description_index(&self) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| matches!(column.role, ColumnRole::Description))
    }

    pub(crate) fn key_index(&self) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| matches!(column.role, ColumnRole::Key))
    }

    pub(crate) fn empty_row(&self) -> Vec<String> {
        vec![String::new(); self.columns.len()]
    }

    pub(crate) fn column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| column.name.to_string())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub(crate) schedule: String,
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<Vec<String>>,
}

impl Table {
    pub(crate) fn empty(schema: &TableSchema) -> Self {
        Self {
            schedule: schema.id.to_string(),
            columns: schema.column_names(),
            rows: Vec::new(),
        }
    }

    pub(crate) fn into_artifact(self) -> TableArtifact {
        TableArtifact {
            schedule: self.schedule,
            columns: self.columns,
            rows: self.rows,
        }
    }
}

/// Normalizes reconstructed rows into the declared output schema: monetary
/// cells gain a leading `$` and thousands separators, percent cells collapse
/// to `<integer>%`, and the optional value-shift correction runs last.
pub(crate) fn assemble_table(
    schema: &TableSchema,
    mut rows: Vec<Vec<String>>,
    shift: Option<&ValueShift>,
) -> Table {
    for row in &mut rows {
        row.resize(schema.columns.len(), String::new());

        for (index, column) in schema.columns.iter().enumerate() {
            let ColumnRole::Value { accepts, .. } = column.role else {
                continue;
            };

            if accepts.contains(&Tag::Currency) {
                if let Some(formatted) = format_currency(&row[index]) {
                    row[index] = formatted;
                    continue;
                }
            }
            if accepts.contains(&Tag::Percent) {
                if let Some(formatted) = format_percent(&row[index]) {
                    row[index] = formatted;
                }
            }
        }

        if let Some(shift) = shift {
            let from = schema.column_index(shift.from);
            let to = schema.column_index(shift.to);
            if let (Some(from), Some(to)) = (from, to) {
                if row[to].is_empty() && row[from].starts_with('$') {
                    row[to] = std::mem::take(&mut row[from]);
                }
            }
        }
    }

    Table {
        schedule: schema.id.to_string(),
        columns: schema.column_names(),
        rows,
    }
}

/// `"8818"` and `"8,818"` become `"$8,818"`; `"$1,000,000.50"` keeps its
/// cents. Anything that is not a plain monetary figure is left untouched.
pub(crate) fn format_currency(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('$').trim();
    if trimmed.is_empty() {
        return None;
    }

    let compact = trimmed.replace(',', "");
    let (integer, fraction) = match compact.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (compact.as_str(), None),
    };

    if integer.is_empty() || !integer.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.chars().all(|ch| ch.is_ascii_digit()) {
            return None;
        }
    }

    let grouped = group_thousands(integer);
    match fraction {
        Some(fraction) => Some(format!("${grouped}.{fraction}")),
        None => Some(format!("${grouped}")),
    }
}

pub(crate) fn format_percent(raw: &str) -> Option<String> {
    let trimmed = raw.trim().strip_suffix('%')?;
    let integer = match trimmed.split_once('.') {
        Some((integer, fraction)) => {
            if !fraction.chars().all(|ch| ch.is_ascii_digit()) {
                return None;
            }
            integer
        }
        None => trimmed,
    };

    if integer.is_empty() || !integer.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }

    Some(format!("{integer}%"))
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;

    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (index + 3 - offset) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}
