use anyhow::{Context, Result};
use regex::Regex;

use super::catalog::{GridSpec, RowPattern, SectionConfig};
use super::classify::{Classifier, Tag, is_count_list};
use super::section::is_header_line;
use super::table::{ColumnRole, TableSchema};

#[derive(Debug, Default, Clone)]
pub(crate) struct ScanCounters {
    pub(crate) rows_emitted: usize,
    pub(crate) rows_empty_value: usize,
    pub(crate) continuation_merges: usize,
    pub(crate) currency_rejoins: usize,
    pub(crate) back_reference_splits: usize,
    pub(crate) vin_relocations: usize,
    pub(crate) header_lines_skipped: usize,
    pub(crate) unbound_tokens: usize,
}

impl ScanCounters {
    pub(crate) fn absorb(&mut self, other: &ScanCounters) {
        self.rows_emitted += other.rows_emitted;
        self.rows_empty_value += other.rows_empty_value;
        self.continuation_merges += other.continuation_merges;
        self.currency_rejoins += other.currency_rejoins;
        self.back_reference_splits += other.back_reference_splits;
        self.vin_relocations += other.vin_relocations;
        self.header_lines_skipped += other.header_lines_skipped;
        self.unbound_tokens += other.unbound_tokens;
    }
}

#[derive(Debug)]
pub(crate) struct RowScan {
    pub(crate) rows: Vec<Vec<String>>,
    pub(crate) counters: ScanCounters,
}

/// Stateful scanner that reassembles logical rows from a located section.
/// Regexes are compiled once and shared across every section of a document.
#[derive(Debug)]
pub(crate) struct RowScanner {
    classifier: Classifier,
    back_reference_tail: Regex,
    edition: Regex,
    vin: Regex,
}

impl RowScanner {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            classifier: Classifier::new()?,
            back_reference_tail: Regex::new(r"(?i)\bsee schedule\b[\s:,]*([\d\s,]+)$")
                .context("failed to compile back-reference regex")?,
            edition: Regex::new(r"^\d{2}-\d{4}$").context("failed to compile edition regex")?,
            vin: Regex::new(r"(?i)\b[A-HJ-NPR-Z0-9]{15,17}\b")
                .context("failed to compile vin regex")?,
        })
    }

    pub(crate) fn reconstruct(&self, cfg: &SectionConfig, section: &[String]) -> RowScan {
        match cfg.pattern {
            RowPattern::LabelLead => self.scan_label_lead(cfg, section),
            RowPattern::KeyAnchored { text_spans_lines } => {
                self.scan_key_anchored(cfg, section, text_spans_lines)
            }
            RowPattern::EditionAnchored => self.scan_edition_anchored(cfg, section),
        }
    }

    // ---- label-lead sections -------------------------------------------

    fn scan_label_lead(&self, cfg: &SectionConfig, section: &[String]) -> RowScan {
        let mut counters = ScanCounters::default();
        let lines = self.rejoin_currency_marks(section, &mut counters);
        let lines = self.merge_continuation_lines(lines, &mut counters);

        let mut state = LabelLeadState::new(cfg);

        for line in &lines {
            if is_header_line(line, cfg) {
                counters.header_lines_skipped += 1;
                continue;
            }

            if let Some(rule) = cfg.context_prefix {
                if line.to_lowercase().starts_with(rule.prefix) {
                    state.finish_row(&mut counters);
                    let value = line[rule.prefix.len()..].trim().to_string();
                    state.set_context(rule.column, value);
                    continue;
                }
            }

            // A bare "See Schedule ..." line is a limits placeholder, not a
            // new coverage label.
            if let Some(rule) = cfg.back_reference {
                if line.to_lowercase().starts_with(rule.phrase) {
                    state.bind_back_reference_line(self, line, &mut counters);
                    continue;
                }
            }

            let (label_part, values) = self.split_trailing_values(line, &mut counters);
            if values.is_empty() {
                state.finish_row(&mut counters);
                state.set_label(self, line, &mut counters);
                continue;
            }

            if !label_part.is_empty() {
                state.finish_row(&mut counters);
                state.set_label(self, &label_part, &mut counters);
            }
            for (text, tag) in values {
                state.bind(&text, tag, &mut counters);
            }
        }

        state.finish_row(&mut counters);
        RowScan { rows: state.rows, counters }
    }

    /// Splits a line into a leading free-text fragment and the trailing run
    /// of classifiable value tokens. A line that classifies as a whole (a
    /// lone amount, an item list) is a single value token.
    fn split_trailing_values(
        &self,
        line: &str,
        counters: &mut ScanCounters,
    ) -> (String, Vec<(String, Tag)>) {
        let trimmed = line.trim();
        let whole = self.classifier.classify(trimmed);
        if whole != Tag::Label {
            return (String::new(), vec![(trimmed.to_string(), whole)]);
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let mut split_at = tokens.len();
        while split_at > 0 {
            if self.classifier.classify(tokens[split_at - 1]) == Tag::Label {
                break;
            }
            split_at -= 1;
        }

        let mut value_tokens: Vec<String> =
            tokens[split_at..].iter().map(|token| (*token).to_string()).collect();

        // A currency mark separated from its numeral rejoins before binding.
        if split_at > 0 && tokens[split_at - 1] == "$" {
            let bare_amount = value_tokens
                .first()
                .map(|token| {
                    !token.starts_with('$') && self.classifier.classify(token) == Tag::Currency
                })
                .unwrap_or(false);
            if bare_amount {
                value_tokens[0] = format!("${}", value_tokens[0]);
                split_at -= 1;
                counters.currency_rejoins += 1;
            }
        }

        let label = tokens[..split_at].join(" ");
        let mut values: Vec<(String, Tag)> = Vec::with_capacity(value_tokens.len());
        for token in value_tokens {
            let tag = self.classifier.classify(&token);
            // "7, 8" splits into two count-list tokens; rejoin them into the
            // single item list they came from.
            if tag == Tag::CountList {
                if let Some((previous, Tag::CountList)) = values.last_mut() {
                    *previous = join_count_lists(previous, &token);
                    continue;
                }
            }
            values.push((token, tag));
        }

        (label, values)
    }

    /// Rejoins a line holding only "$" with the bare amount on the next line.
    fn rejoin_currency_marks(
        &self,
        section: &[String],
        counters: &mut ScanCounters,
    ) -> Vec<String> {
        let mut lines = Vec::with_capacity(section.len());
        let mut index = 0usize;

        while index < section.len() {
            let line = section[index].trim();
            if line == "$" && index + 1 < section.len() {
                let next = section[index + 1].trim();
                if !next.starts_with('$') && self.classifier.classify(next) == Tag::Currency {
                    lines.push(format!("${next}"));
                    counters.currency_rejoins += 1;
                    index += 2;
                    continue;
                }
            }

            lines.push(line.to_string());
            index += 1;
        }

        lines
    }

    /// Folds word-wrap continuations back into the previous line: a trailing
    /// hyphen, an unclosed parenthesis, or a lowercase "or " lead-in. The
    /// merged line is re-tokenized by the caller; this is the only place
    /// lines are rewritten rather than reclassified.
    fn merge_continuation_lines(
        &self,
        lines: Vec<String>,
        counters: &mut ScanCounters,
    ) -> Vec<String> {
        let mut merged: Vec<String> = Vec::with_capacity(lines.len());

        for line in lines {
            if let Some(previous) = merged.last_mut() {
                if self.is_continuation(previous, &line) {
                    *previous = join_continuation(previous, &line);
                    counters.continuation_merges += 1;
                    continue;
                }
            }
            merged.push(line);
        }

        merged
    }

    fn is_continuation(&self, previous: &str, current: &str) -> bool {
        let prev_is_text = previous
            .split_whitespace()
            .last()
            .map(|token| self.classifier.classify(token) == Tag::Label)
            .unwrap_or(false);
        if !prev_is_text {
            return false;
        }

        if previous.trim_end().ends_with('-') {
            return true;
        }
        let open = previous.matches('(').count();
        let close = previous.matches(')').count();
        if open > close {
            return true;
        }

        current.starts_with("or ")
    }

    // ---- key-anchored sections -----------------------------------------

    fn scan_key_anchored(
        &self,
        cfg: &SectionConfig,
        section: &[String],
        text_spans_lines: bool,
    ) -> RowScan {
        let mut counters = ScanCounters::default();
        let lines = self.rejoin_currency_marks(section, &mut counters);

        let schema = &cfg.schema;
        let key_index = schema.key_index().unwrap_or(0);
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut row: Option<Vec<String>> = None;

        for line in &lines {
            if is_header_line(line, cfg) {
                counters.header_lines_skipped += 1;
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(first) = tokens.first() else {
                continue;
            };

            if is_key_token(first) {
                if let Some(done) = row.take() {
                    self.finish_key_row(cfg, done, &mut rows, &mut counters);
                }
                let mut fresh = schema.empty_row();
                fresh[key_index] = (*first).to_string();
                self.bind_key_tokens(cfg, &mut fresh, &tokens[1..], &mut counters);
                row = Some(fresh);
                continue;
            }

            let Some(current) = row.as_mut() else {
                continue;
            };
            if text_spans_lines {
                self.bind_key_tokens(cfg, current, &tokens, &mut counters);
            } else {
                // values may still trail on follow-up lines; stray text may not
                for token in &tokens {
                    let tag = self.classifier.classify(token);
                    if tag == Tag::Label {
                        counters.unbound_tokens += 1;
                    } else if let Some(index) = first_unbound_accepting(schema, current, token, tag)
                    {
                        current[index] = normalize_value_text(token, tag);
                    } else {
                        counters.unbound_tokens += 1;
                    }
                }
            }
        }

        if let Some(done) = row.take() {
            self.finish_key_row(cfg, done, &mut rows, &mut counters);
        }

        RowScan { rows, counters }
    }

    fn bind_key_tokens(
        &self,
        cfg: &SectionConfig,
        row: &mut [String],
        tokens: &[&str],
        counters: &mut ScanCounters,
    ) {
        let schema = &cfg.schema;
        let description_index = schema.description_index();
        let vin_index = cfg
            .vin_column
            .and_then(|name| schema.column_index(name));

        for token in tokens {
            let tag = self.classifier.classify(token);
            if tag != Tag::Label {
                if let Some(index) = first_unbound_accepting(schema, row, token, tag) {
                    row[index] = normalize_value_text(token, tag);
                } else {
                    counters.unbound_tokens += 1;
                }
                continue;
            }

            if let Some(vin_index) = vin_index {
                if row[vin_index].is_empty() {
                    if let Some(vin) = extract_vin(token) {
                        row[vin_index] = vin;
                        continue;
                    }
                }
            }

            match description_index {
                Some(index) => {
                    if !row[index].is_empty() {
                        row[index].push(' ');
                    }
                    row[index].push_str(token);
                }
                None => counters.unbound_tokens += 1,
            }
        }
    }

    fn finish_key_row(
        &self,
        cfg: &SectionConfig,
        row: Vec<String>,
        rows: &mut Vec<Vec<String>>,
        counters: &mut ScanCounters,
    ) {
        let schema = &cfg.schema;

        if row.iter().all(|cell| cell.is_empty()) {
            return;
        }

        if has_empty_value_columns_only(schema, &row) {
            counters.rows_empty_value += 1;
        }
        counters.rows_emitted += 1;
        rows.push(row);
    }

    // ---- edition-anchored sections -------------------------------------

    fn scan_edition_anchored(&self, cfg: &SectionConfig, section: &[String]) -> RowScan {
        let mut counters = ScanCounters::default();
        let schema = &cfg.schema;

        let title_index = schema
            .columns
            .iter()
            .position(|column| matches!(column.role, ColumnRole::Derived));
        let description_index = schema.description_index().unwrap_or(schema.columns.len() - 1);
        let value_indexes: Vec<usize> = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| matches!(column.role, ColumnRole::Value { .. }))
            .map(|(index, _)| index)
            .collect();
        let number_index = value_indexes.first().copied().unwrap_or(description_index);
        let edition_index = value_indexes.get(1).copied().unwrap_or(description_index);

        let untitled = cfg.subsection_titles.is_empty();
        let mut current_title: Option<String> = untitled.then(String::new);
        let mut title_row_start = 0usize;
        let mut rows: Vec<Vec<String>> = Vec::new();

        for line in section {
            let line = line.trim();

            if cfg.subsection_titles.contains(&line) {
                current_title = Some(line.to_string());
                title_row_start = rows.len();
                continue;
            }

            let Some(title) = current_title.clone() else {
                continue;
            };

            if !untitled && line.starts_with("Commercial ") {
                current_title = None;
                continue;
            }

            if is_header_line(line, cfg) {
                counters.header_lines_skipped += 1;
                continue;
            }

            let (number, edition, description) = self.split_edition_row(line);
            if edition.is_empty() {
                let text = [number, description]
                    .iter()
                    .filter(|part| !part.is_empty())
                    .cloned()
                    .collect::<Vec<String>>()
                    .join(" ");
                if text.is_empty() {
                    continue;
                }

                if rows.len() > title_row_start {
                    let last = rows.last_mut().expect("continuation has a previous row");
                    if !last[description_index].is_empty() {
                        last[description_index].push(' ');
                    }
                    last[description_index].push_str(&text);
                    counters.continuation_merges += 1;
                } else {
                    let mut row = schema.empty_row();
                    if let Some(title_index) = title_index {
                        row[title_index] = title;
                    }
                    row[description_index] = text;
                    rows.push(row);
                    counters.rows_emitted += 1;
                    counters.rows_empty_value += 1;
                }
                continue;
            }

            let mut row = schema.empty_row();
            if let Some(title_index) = title_index {
                row[title_index] = title;
            }
            row[number_index] = number;
            row[edition_index] = edition;
            row[description_index] = description;
            rows.push(row);
            counters.rows_emitted += 1;
        }

        RowScan { rows, counters }
    }

    /// Frees a VIN embedded in a description cell after all passes merged:
    /// the 15-17 character run moves to the VIN column and the description
    /// keeps the remainder. Returns the number of relocations.
    pub(crate) fn relocate_vins(&self, cfg: &SectionConfig, rows: &mut [Vec<String>]) -> usize {
        let schema = &cfg.schema;
        let Some(vin_index) = cfg.vin_column.and_then(|name| schema.column_index(name)) else {
            return 0;
        };
        let Some(description_index) = schema.description_index() else {
            return 0;
        };

        let mut relocations = 0usize;
        for row in rows {
            if looks_like_vin(&row[vin_index]) {
                continue;
            }

            let description = row[description_index].clone();
            let Some(found) = self.vin.find(&description) else {
                continue;
            };

            let vin = found.as_str().to_uppercase();
            let mut rebuilt = description.clone();
            rebuilt.replace_range(found.range(), "");
            row[description_index] = rebuilt.split_whitespace().collect::<Vec<&str>>().join(" ");
            row[vin_index] = vin;
            relocations += 1;
        }

        relocations
    }

    /// Splits a forms line on its `MM-YYYY` edition token: everything before
    /// is the form number, everything after the description.
    fn split_edition_row(&self, line: &str) -> (String, String, String) {
        let mut number_parts: Vec<&str> = Vec::new();
        let mut description_parts: Vec<&str> = Vec::new();
        let mut edition = String::new();

        for token in line.split_whitespace() {
            if edition.is_empty() && self.edition.is_match(token) {
                edition = token.to_string();
            } else if edition.is_empty() {
                number_parts.push(token);
            } else {
                description_parts.push(token);
            }
        }

        (
            number_parts.join(" "),
            edition,
            description_parts.join(" "),
        )
    }
}

// ---- label-lead row state ----------------------------------------------

#[derive(Debug)]
struct LabelLeadState<'a> {
    cfg: &'a SectionConfig,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    label: String,
    bound_any: bool,
    context: Option<(usize, String)>,
}

impl<'a> LabelLeadState<'a> {
    fn new(cfg: &'a SectionConfig) -> Self {
        Self {
            cfg,
            rows: Vec::new(),
            row: cfg.schema.empty_row(),
            label: String::new(),
            bound_any: false,
            context: None,
        }
    }

    fn set_context(&mut self, column: &str, value: String) {
        if let Some(index) = self.cfg.schema.column_index(column) {
            self.context = Some((index, value));
        }
    }

    fn bind(&mut self, text: &str, tag: Tag, counters: &mut ScanCounters) {
        let schema = &self.cfg.schema;

        for attempt in 0..2 {
            if let Some(index) = first_unbound_accepting(schema, &self.row, text, tag) {
                self.row[index] = normalize_value_text(text, tag);
                self.bound_any = true;
                if value_columns_full(schema, &self.row) {
                    self.finish_row(counters);
                }
                return;
            }

            // A value the current row cannot hold opens the next row.
            if attempt == 0 && self.bound_any {
                self.finish_row(counters);
                continue;
            }
            break;
        }

        counters.unbound_tokens += 1;
    }

    fn bind_back_reference_line(
        &mut self,
        scanner: &RowScanner,
        line: &str,
        counters: &mut ScanCounters,
    ) {
        let rule = self
            .cfg
            .back_reference
            .expect("back-reference rule present");
        let schema = &self.cfg.schema;
        let mut placeholder_text = line.trim().to_string();

        if let Some(captures) = scanner.back_reference_tail.captures(line) {
            let tail: String = captures
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .chars()
                .filter(|ch| !ch.is_whitespace())
                .collect();
            if is_count_list(&tail) {
                if let Some(index) = schema.column_index(rule.items_column) {
                    if self.row[index].is_empty() {
                        self.row[index] = tail;
                    }
                }
                let cut = captures.get(0).map(|m| m.start()).unwrap_or(line.len());
                placeholder_text = line[..cut].trim_end_matches([' ', ',', ';']).to_string();
                if placeholder_text.is_empty() {
                    placeholder_text = rule.placeholder.to_string();
                }
                counters.back_reference_splits += 1;
            }
        }

        if let Some(index) = schema.column_index(rule.placeholder_column) {
            if self.row[index].is_empty() {
                self.row[index] = placeholder_text;
            }
        }
        self.bound_any = true;
    }

    /// Opens a new logical row around a label, excising an embedded
    /// back-reference tail first so later amounts bind past the placeholder.
    fn set_label(&mut self, scanner: &RowScanner, text: &str, counters: &mut ScanCounters) {
        let mut label = text.trim().to_string();
        let schema = &self.cfg.schema;

        if let Some(rule) = self.cfg.back_reference {
            let snapshot = label.clone();
            if let Some(captures) = scanner.back_reference_tail.captures(&snapshot) {
                let tail: String = captures
                    .get(1)
                    .map(|m| m.as_str())
                    .unwrap_or_default()
                    .chars()
                    .filter(|ch| !ch.is_whitespace())
                    .collect();
                if is_count_list(&tail) {
                    if let Some(index) = schema.column_index(rule.items_column) {
                        if self.row[index].is_empty() {
                            self.row[index] = tail;
                        }
                    }
                    let cut = captures.get(0).map(|m| m.start()).unwrap_or(snapshot.len());
                    label = snapshot[..cut].trim_end_matches([' ', ',', ';']).to_string();
                    if let Some(index) = schema.column_index(rule.placeholder_column) {
                        if self.row[index].is_empty() {
                            self.row[index] = rule.placeholder.to_string();
                        }
                    }
                    counters.back_reference_splits += 1;
                    self.bound_any = true;
                }
            } else if snapshot.to_lowercase().ends_with(rule.phrase) {
                // The item list travels separately; the label still carries
                // the dangling phrase.
                let cut = snapshot.len() - rule.phrase.len();
                label = snapshot[..cut].trim_end_matches([' ', ',', ';']).to_string();
                if let Some(index) = schema.column_index(rule.placeholder_column) {
                    if self.row[index].is_empty() {
                        self.row[index] = rule.placeholder.to_string();
                    }
                }
                counters.back_reference_splits += 1;
                self.bound_any = true;
            }
        }

        self.label = label;
    }

    fn finish_row(&mut self, counters: &mut ScanCounters) {
        let schema = &self.cfg.schema;
        let label = std::mem::take(&mut self.label).trim().to_string();

        let has_values = self.row.iter().any(|cell| !cell.is_empty());
        if label.is_empty() && !has_values {
            self.bound_any = false;
            return;
        }

        if let Some(index) = schema.description_index() {
            self.row[index] = label;
        }
        if let Some((index, value)) = &self.context {
            if self.row[*index].is_empty() {
                self.row[*index] = value.clone();
            }
        }

        if has_empty_value_columns_only(schema, &self.row) {
            counters.rows_empty_value += 1;
        }
        counters.rows_emitted += 1;
        self.rows
            .push(std::mem::replace(&mut self.row, schema.empty_row()));
        self.bound_any = false;
    }
}

// ---- grid pass ---------------------------------------------------------

/// Binds the layout-grid variant of a section: locates the header row whose
/// cells carry the schedule's column titles, then maps data cells by
/// position. A keyless grid row fills the still-empty cells of the previous
/// row (wrapped cells in the layout rendering).
pub(crate) fn extract_grid_rows(
    grid: &[Vec<String>],
    cfg: &SectionConfig,
    spec: &GridSpec,
) -> Vec<Vec<String>> {
    let schema = &cfg.schema;
    let Some(key) = schema.natural_key else {
        return Vec::new();
    };
    let Some(key_index) = schema.column_index(key.column) else {
        return Vec::new();
    };

    let Some(start) = grid.iter().position(|cells| {
        let joined = cells.join(" ").to_lowercase();
        cfg.start_markers.iter().any(|marker| joined.contains(marker))
    }) else {
        return Vec::new();
    };

    let mut header_map: Vec<(usize, usize)> = Vec::new();
    let mut header_row = None;
    for (index, cells) in grid.iter().enumerate().skip(start) {
        let joined = cells.join(" ").to_lowercase();
        if index > start && cfg.stop_markers.iter().any(|marker| joined.contains(marker)) {
            return Vec::new();
        }

        let mut map = Vec::new();
        let mut all_required = true;
        for column in spec.columns {
            let position = cells
                .iter()
                .position(|cell| cell.to_lowercase().contains(column.title));
            match (position, schema.column_index(column.column)) {
                (Some(cell_index), Some(schema_index)) => map.push((schema_index, cell_index)),
                (None, _) if !column.required => {}
                _ => {
                    all_required = false;
                    break;
                }
            }
        }

        if all_required {
            header_map = map;
            header_row = Some(index);
            break;
        }
    }

    let Some(header_row) = header_row else {
        return Vec::new();
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    for cells in &grid[header_row + 1..] {
        let joined = cells.join(" ").to_lowercase();
        if cfg.stop_markers.iter().any(|marker| joined.contains(marker)) {
            break;
        }

        let mut row = schema.empty_row();
        for (schema_index, cell_index) in &header_map {
            row[*schema_index] = cells
                .get(*cell_index)
                .map(|cell| cell.trim().to_string())
                .unwrap_or_default();
        }

        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        if row[key_index].is_empty() {
            if let Some(previous) = rows.last_mut() {
                for (index, value) in row.into_iter().enumerate() {
                    if previous[index].is_empty() && !value.is_empty() {
                        previous[index] = value;
                    }
                }
            }
            continue;
        }

        rows.push(row);
    }

    rows
}

// ---- shared helpers ----------------------------------------------------

fn first_unbound_accepting(
    schema: &TableSchema,
    row: &[String],
    token: &str,
    tag: Tag,
) -> Option<usize> {
    schema.columns.iter().enumerate().find_map(|(index, column)| {
        let ColumnRole::Value { accepts, min_digits } = column.role else {
            return None;
        };
        if !row[index].is_empty() || !accepts.contains(&tag) {
            return None;
        }
        if digit_count(token) < min_digits {
            return None;
        }
        Some(index)
    })
}

fn value_columns_full(schema: &TableSchema, row: &[String]) -> bool {
    schema.columns.iter().enumerate().all(|(index, column)| {
        !matches!(column.role, ColumnRole::Value { .. }) || !row[index].is_empty()
    })
}

fn has_empty_value_columns_only(schema: &TableSchema, row: &[String]) -> bool {
    let mut saw_value_column = false;
    for (index, column) in schema.columns.iter().enumerate() {
        if matches!(column.role, ColumnRole::Value { .. }) {
            saw_value_column = true;
            if !row[index].is_empty() {
                return false;
            }
        }
    }

    saw_value_column
}

fn normalize_value_text(token: &str, tag: Tag) -> String {
    if tag == Tag::CountList {
        token.chars().filter(|ch| !ch.is_whitespace()).collect()
    } else {
        token.trim().to_string()
    }
}

fn digit_count(token: &str) -> usize {
    token.chars().filter(|ch| ch.is_ascii_digit()).count()
}

fn join_count_lists(left: &str, right: &str) -> String {
    let mut joined = String::with_capacity(left.len() + right.len() + 1);
    for ch in left.chars().chain(std::iter::once(',')).chain(right.chars()) {
        if ch.is_ascii_digit() {
            joined.push(ch);
        } else if ch == ',' && !joined.is_empty() && !joined.ends_with(',') {
            joined.push(',');
        }
    }

    joined.trim_end_matches(',').to_string()
}

fn join_continuation(previous: &str, current: &str) -> String {
    let left = previous.trim_end();
    let left = if left.ends_with('-') {
        left.trim_end_matches('-')
    } else {
        left
    };

    format!("{} {}", left.trim_end(), current.trim_start())
}

fn is_key_token(token: &str) -> bool {
    !token.is_empty() && token.len() <= 3 && token.chars().all(|ch| ch.is_ascii_digit())
}

pub(crate) fn extract_vin(token: &str) -> Option<String> {
    let cleaned: String = token
        .to_uppercase()
        .chars()
        .filter(|ch| ch.is_ascii_digit() || (ch.is_ascii_uppercase() && !"IOQ".contains(*ch)))
        .collect();

    if (15..=17).contains(&cleaned.len()) {
        Some(cleaned)
    } else {
        None
    }
}

pub(crate) fn looks_like_vin(value: &str) -> bool {
    let value = value.trim();
    value.len() >= 8
        && value.chars().any(|ch| ch.is_ascii_digit())
        && value.chars().any(|ch| ch.is_ascii_alphabetic())
}
