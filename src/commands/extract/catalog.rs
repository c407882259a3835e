use anyhow::{Result, bail};

use super::classify::Tag;
use super::table::{ColumnRole, ColumnSpec, NaturalKey, TableSchema, ValueShift};

/// How the scanner turns a section's lines into logical rows.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RowPattern {
    /// A free-text label opens the row; classified values bind afterwards.
    LabelLead,
    /// A numeric key token at line start opens the row (vehicle, deductible,
    /// and payee schedules). `text_spans_lines` lets the description keep
    /// absorbing label lines after the anchor line.
    KeyAnchored { text_spans_lines: bool },
    /// Rows are anchored by an edition token (`MM-YYYY`) inside the line;
    /// edition-less lines continue the previous description. Subsection
    /// titles open repeated form schedules.
    EditionAnchored,
}

/// Excision of a `see schedule 7, 8` tail from a label: the item list moves
/// to `items_column` and `placeholder_column` receives `placeholder` when it
/// is still empty.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BackReference {
    pub(crate) phrase: &'static str,
    pub(crate) items_column: &'static str,
    pub(crate) placeholder_column: &'static str,
    pub(crate) placeholder: &'static str,
}

/// A `Location: ...` style context line; its value is carried into `column`
/// for every row that follows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContextPrefix {
    pub(crate) prefix: &'static str,
    pub(crate) column: &'static str,
}

/// Column-title mapping for the layout-grid pass. A grid table is only
/// extracted when every required title is present in one header row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GridColumn {
    pub(crate) column: &'static str,
    pub(crate) title: &'static str,
    pub(crate) required: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct GridSpec {
    pub(crate) columns: &'static [GridColumn],
}

#[derive(Debug, Clone)]
pub(crate) struct SectionConfig {
    pub(crate) schema: TableSchema,
    pub(crate) start_markers: &'static [&'static str],
    pub(crate) stop_markers: &'static [&'static str],
    pub(crate) header_words: &'static [&'static str],
    pub(crate) header_prefixes: &'static [&'static str],
    pub(crate) repeated: bool,
    pub(crate) pattern: RowPattern,
    pub(crate) subsection_titles: &'static [&'static str],
    pub(crate) back_reference: Option<BackReference>,
    pub(crate) context_prefix: Option<ContextPrefix>,
    pub(crate) value_shift: Option<ValueShift>,
    pub(crate) vin_column: Option<&'static str>,
    pub(crate) grid: Option<GridSpec>,
}

impl SectionConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        self.schema.validate()?;

        if self.start_markers.is_empty() {
            bail!("section '{}' declares no start markers", self.schema.id);
        }

        if matches!(self.pattern, RowPattern::KeyAnchored { .. }) && self.schema.key_index().is_none()
        {
            bail!("section '{}' is key-anchored but has no key column", self.schema.id);
        }

        if matches!(self.pattern, RowPattern::EditionAnchored) {
            let value_columns = self
                .schema
                .columns
                .iter()
                .filter(|column| matches!(column.role, ColumnRole::Value { .. }))
                .count();
            if value_columns < 2 || self.schema.description_index().is_none() {
                bail!(
                    "section '{}' is edition-anchored and needs number, edition, and description columns",
                    self.schema.id
                );
            }
        }

        for name in [
            self.back_reference.map(|rule| rule.items_column),
            self.back_reference.map(|rule| rule.placeholder_column),
            self.context_prefix.map(|rule| rule.column),
            self.value_shift.map(|rule| rule.from),
            self.value_shift.map(|rule| rule.to),
            self.vin_column,
        ]
        .into_iter()
        .flatten()
        {
            if self.schema.column_index(name).is_none() {
                bail!("section '{}' references unknown column '{}'", self.schema.id, name);
            }
        }

        if let Some(grid) = &self.grid {
            if self.schema.natural_key.is_none() {
                bail!(
                    "section '{}' declares a grid pass without a natural key",
                    self.schema.id
                );
            }
            for column in grid.columns {
                if self.schema.column_index(column.column).is_none() {
                    bail!(
                        "section '{}' grid maps unknown column '{}'",
                        self.schema.id,
                        column.column
                    );
                }
            }
        }

        Ok(())
    }
}

const CURRENCY: &[Tag] = &[Tag::Currency];
const CURRENCY_OR_CODE: &[Tag] = &[Tag::Currency, Tag::Identifier];
const CURRENCY_OR_PERCENT: &[Tag] = &[Tag::Currency, Tag::Percent];
const ITEM_LIST: &[Tag] = &[Tag::CountList];
const YEAR_CODE: &[Tag] = &[Tag::Identifier];
const FORM_NUMBER: &[Tag] = &[Tag::Identifier];
const EDITION_DATE: &[Tag] = &[Tag::DateLike];

const FORM_SCHEDULE_TITLES: &[&str] = &[
    "Commercial Common Forms",
    "Commercial General Liability Coverage Part",
    "Commercial General Liability",
    "Commercial Workers Compensation",
    "Commercial Automobile Coverage Part",
    "Commercial Property Coverage Part",
    "Commercial Property Forms",
    "Commercial Umbrella Coverage Part",
    "Inland Marine Coverage Part",
];

/// The built-in schedule catalog. Marker vocabulary and header words come
/// from the proposal layouts; the engine itself is marker-agnostic, so new
/// schedules are added here as data.
pub(crate) fn builtin() -> Result<Vec<SectionConfig>> {
    let configs = vec![
        SectionConfig {
            schema: TableSchema {
                id: "coverage_premiums",
                columns: &[
                    ColumnSpec { name: "coverage", role: ColumnRole::Description },
                    ColumnSpec {
                        name: "premium",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 0 },
                    },
                ],
                natural_key: None,
            },
            start_markers: &["commercial auto coverages premium"],
            stop_markers: &["schedule of coverages and covered autos"],
            header_words: &["coverage", "premium"],
            header_prefixes: &[],
            repeated: false,
            pattern: RowPattern::LabelLead,
            subsection_titles: &[],
            back_reference: None,
            context_prefix: None,
            value_shift: None,
            vin_column: None,
            grid: None,
        },
        SectionConfig {
            schema: TableSchema {
                id: "coverage_schedule",
                columns: &[
                    ColumnSpec { name: "coverage", role: ColumnRole::Description },
                    ColumnSpec {
                        name: "limits",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 0 },
                    },
                    ColumnSpec {
                        name: "covered_autos",
                        role: ColumnRole::Value { accepts: ITEM_LIST, min_digits: 0 },
                    },
                    ColumnSpec {
                        name: "premium",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 0 },
                    },
                ],
                natural_key: None,
            },
            start_markers: &["schedule of coverages and covered autos"],
            stop_markers: &["schedule of covered autos you own", "endorsements"],
            header_words: &["coverages", "limits", "covered", "autos", "premium", "deductibles"],
            header_prefixes: &["coverages"],
            repeated: false,
            pattern: RowPattern::LabelLead,
            subsection_titles: &[],
            back_reference: Some(BackReference {
                phrase: "see schedule",
                items_column: "covered_autos",
                placeholder_column: "limits",
                placeholder: "See Schedule",
            }),
            context_prefix: None,
            value_shift: None,
            vin_column: None,
            grid: None,
        },
        SectionConfig {
            schema: TableSchema {
                id: "vehicle_schedule",
                columns: &[
                    ColumnSpec { name: "veh_no", role: ColumnRole::Key },
                    ColumnSpec {
                        name: "year",
                        role: ColumnRole::Value { accepts: YEAR_CODE, min_digits: 4 },
                    },
                    ColumnSpec { name: "model", role: ColumnRole::Description },
                    ColumnSpec { name: "vin", role: ColumnRole::Derived },
                    ColumnSpec {
                        name: "value",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 0 },
                    },
                    ColumnSpec {
                        name: "premium",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 0 },
                    },
                ],
                natural_key: Some(NaturalKey { column: "veh_no", numeric: true }),
            },
            start_markers: &["schedule of covered autos you own"],
            stop_markers: &["classification", "schedule of loss payees"],
            header_words: &[
                "no.", "year", "model", "vin", "number", "value", "original", "cost", "new",
                "stated", "amount", "premium",
            ],
            header_prefixes: &[],
            repeated: false,
            pattern: RowPattern::KeyAnchored { text_spans_lines: true },
            subsection_titles: &[],
            back_reference: None,
            context_prefix: None,
            value_shift: None,
            vin_column: Some("vin"),
            grid: Some(GridSpec {
                columns: &[
                    GridColumn { column: "veh_no", title: "no.", required: true },
                    GridColumn { column: "year", title: "year", required: true },
                    GridColumn { column: "model", title: "model", required: true },
                    GridColumn { column: "vin", title: "vin", required: true },
                    GridColumn { column: "value", title: "value", required: false },
                    GridColumn { column: "premium", title: "premium", required: false },
                ],
            }),
        },
        SectionConfig {
            schema: TableSchema {
                id: "vehicle_deductibles",
                columns: &[
                    ColumnSpec { name: "veh_no", role: ColumnRole::Key },
                    ColumnSpec {
                        name: "comp_deductible",
                        role: ColumnRole::Value { accepts: CURRENCY_OR_CODE, min_digits: 0 },
                    },
                    ColumnSpec {
                        name: "collision_deductible",
                        role: ColumnRole::Value { accepts: CURRENCY_OR_CODE, min_digits: 0 },
                    },
                ],
                natural_key: Some(NaturalKey { column: "veh_no", numeric: true }),
            },
            start_markers: &["premium deductibles"],
            stop_markers: &["schedule of loss payees"],
            header_words: &["veh", "no.", "comp", "coll", "loss", "deductible", "deductibles"],
            header_prefixes: &[],
            repeated: false,
            pattern: RowPattern::KeyAnchored { text_spans_lines: false },
            subsection_titles: &[],
            back_reference: None,
            context_prefix: None,
            value_shift: None,
            vin_column: None,
            grid: None,
        },
        SectionConfig {
            schema: TableSchema {
                id: "loss_payees",
                columns: &[
                    ColumnSpec { name: "veh_no", role: ColumnRole::Key },
                    ColumnSpec { name: "loss_payee", role: ColumnRole::Description },
                ],
                natural_key: Some(NaturalKey { column: "veh_no", numeric: true }),
            },
            start_markers: &["schedule of loss payees"],
            stop_markers: &["schedule of hired or borrowed"],
            header_words: &["veh", "no.", "loss", "payee"],
            header_prefixes: &[],
            repeated: false,
            pattern: RowPattern::KeyAnchored { text_spans_lines: false },
            subsection_titles: &[],
            back_reference: None,
            context_prefix: None,
            value_shift: None,
            vin_column: None,
            grid: None,
        },
        SectionConfig {
            schema: TableSchema {
                id: "additional_coverages",
                columns: &[
                    ColumnSpec { name: "coverage", role: ColumnRole::Description },
                    ColumnSpec {
                        name: "limit",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 5 },
                    },
                    ColumnSpec {
                        name: "deductible",
                        role: ColumnRole::Value { accepts: CURRENCY_OR_PERCENT, min_digits: 0 },
                    },
                    ColumnSpec {
                        name: "premium",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 0 },
                    },
                ],
                natural_key: None,
            },
            start_markers: &["product wide coverages"],
            stop_markers: &[
                "location coverages",
                "vehicle coverages",
                "commercial liability umbrella quote proposal",
                "commercial inland marine quote proposal",
                "rating company:",
            ],
            header_words: &["coverage", "limit", "deductible", "premium"],
            header_prefixes: &[],
            repeated: false,
            pattern: RowPattern::LabelLead,
            subsection_titles: &[],
            back_reference: None,
            context_prefix: None,
            value_shift: Some(ValueShift { from: "deductible", to: "premium" }),
            vin_column: None,
            grid: None,
        },
        SectionConfig {
            schema: TableSchema {
                id: "location_coverages",
                columns: &[
                    ColumnSpec { name: "location", role: ColumnRole::Derived },
                    ColumnSpec { name: "coverage", role: ColumnRole::Description },
                    ColumnSpec {
                        name: "limit",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 5 },
                    },
                    ColumnSpec {
                        name: "deductible",
                        role: ColumnRole::Value { accepts: CURRENCY_OR_PERCENT, min_digits: 0 },
                    },
                    ColumnSpec {
                        name: "premium",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 0 },
                    },
                ],
                natural_key: None,
            },
            start_markers: &["location coverages"],
            stop_markers: &[
                "vehicle coverages",
                "additional coverages",
                "commercial liability umbrella quote proposal",
                "commercial inland marine quote proposal",
                "proposal 01 00",
            ],
            header_words: &["location", "coverage", "limit", "deductible", "premium"],
            header_prefixes: &[],
            repeated: false,
            pattern: RowPattern::LabelLead,
            subsection_titles: &[],
            back_reference: None,
            context_prefix: Some(ContextPrefix { prefix: "location:", column: "location" }),
            value_shift: Some(ValueShift { from: "deductible", to: "premium" }),
            vin_column: None,
            grid: None,
        },
        SectionConfig {
            schema: TableSchema {
                id: "state_premium_summary",
                columns: &[
                    ColumnSpec { name: "description", role: ColumnRole::Description },
                    ColumnSpec {
                        name: "premium",
                        role: ColumnRole::Value { accepts: CURRENCY, min_digits: 0 },
                    },
                ],
                natural_key: None,
            },
            start_markers: &["schedule of operations"],
            stop_markers: &["workers compensation and employers"],
            header_words: &[
                "loc", "st", "no.", "classification", "premium", "basis", "rate", "rates",
            ],
            header_prefixes: &[],
            repeated: true,
            pattern: RowPattern::LabelLead,
            subsection_titles: &[],
            back_reference: None,
            context_prefix: None,
            value_shift: None,
            vin_column: None,
            grid: None,
        },
        SectionConfig {
            schema: TableSchema {
                id: "policy_forms",
                columns: &[
                    ColumnSpec { name: "coverage_part", role: ColumnRole::Derived },
                    ColumnSpec {
                        name: "number",
                        role: ColumnRole::Value { accepts: FORM_NUMBER, min_digits: 0 },
                    },
                    ColumnSpec {
                        name: "edition",
                        role: ColumnRole::Value { accepts: EDITION_DATE, min_digits: 0 },
                    },
                    ColumnSpec { name: "description", role: ColumnRole::Description },
                ],
                natural_key: None,
            },
            start_markers: &["schedule of forms and endorsements"],
            stop_markers: &[],
            header_words: &["number", "edition", "description"],
            header_prefixes: &[],
            repeated: false,
            pattern: RowPattern::EditionAnchored,
            subsection_titles: FORM_SCHEDULE_TITLES,
            back_reference: None,
            context_prefix: None,
            value_shift: None,
            vin_column: None,
            grid: None,
        },
    ];

    for config in &configs {
        config.validate()?;
    }

    Ok(configs)
}
