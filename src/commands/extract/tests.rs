use super::catalog::{self, RowPattern, SectionConfig};
use super::classify::{Classifier, Tag, is_count_list};
use super::merge::{ExtractionPass, TrustLevel, reconcile};
use super::rows::{RowScanner, extract_grid_rows, extract_vin, looks_like_vin};
use super::run::extract_document_tables;
use super::section::locate_sections;
use super::source::DocumentText;
use super::table::{
    ColumnRole, ColumnSpec, NaturalKey, TableSchema, assemble_table, format_currency,
    format_percent,
};
use crate::model::ExtractCounts;

fn lines(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn scanner() -> RowScanner {
    RowScanner::new().expect("row scanner builds")
}

fn classifier() -> Classifier {
    Classifier::new().expect("classifier builds")
}

fn builtin_config(id: &str) -> SectionConfig {
    catalog::builtin()
        .expect("catalog validates")
        .into_iter()
        .find(|config| config.schema.id == id)
        .unwrap_or_else(|| panic!("catalog config {id} exists"))
}

const COVERAGE_TEST_SCHEMA: TableSchema = TableSchema {
    id: "coverage_test",
    columns: &[
        ColumnSpec { name: "label", role: ColumnRole::Description },
        ColumnSpec {
            name: "limit",
            role: ColumnRole::Value { accepts: &[Tag::Currency], min_digits: 0 },
        },
        ColumnSpec {
            name: "covered_items",
            role: ColumnRole::Value { accepts: &[Tag::CountList], min_digits: 0 },
        },
    ],
    natural_key: None,
};

const MERGE_TEST_SCHEMA: TableSchema = TableSchema {
    id: "merge_test",
    columns: &[
        ColumnSpec { name: "item", role: ColumnRole::Key },
        ColumnSpec {
            name: "limit",
            role: ColumnRole::Value { accepts: &[Tag::Currency], min_digits: 0 },
        },
    ],
    natural_key: Some(NaturalKey { column: "item", numeric: true }),
};

fn coverage_test_config() -> SectionConfig {
    SectionConfig {
        schema: COVERAGE_TEST_SCHEMA,
        start_markers: &["coverage summary"],
        stop_markers: &["end of coverages"],
        header_words: &[],
        header_prefixes: &[],
        repeated: false,
        pattern: RowPattern::LabelLead,
        subsection_titles: &[],
        back_reference: None,
        context_prefix: None,
        value_shift: None,
        vin_column: None,
        grid: None,
    }
}

#[test]
fn classify_discriminates_item_lists_from_currency() {
    let classifier = classifier();

    assert_eq!(classifier.classify("7,8"), Tag::CountList);
    assert_eq!(classifier.classify("7, 8"), Tag::CountList);
    assert_eq!(classifier.classify("8,818"), Tag::Currency);
    assert_eq!(classifier.classify("$8,818"), Tag::Currency);
    assert_eq!(classifier.classify("$ 500"), Tag::Currency);
    assert_eq!(classifier.classify("1,000,000"), Tag::Currency);
    assert_eq!(classifier.classify("12%"), Tag::Percent);
    assert_eq!(classifier.classify("Liability"), Tag::Label);
}

#[test]
fn classify_recognizes_codes_dates_and_fallback() {
    let classifier = classifier();

    assert_eq!(classifier.classify("CA7110"), Tag::Identifier);
    assert_eq!(classifier.classify("2019"), Tag::Identifier);
    assert_eq!(classifier.classify("88109"), Tag::Identifier);
    assert_eq!(classifier.classify("09-2008"), Tag::DateLike);
    assert_eq!(classifier.classify("01/01/2025"), Tag::DateLike);
    assert_eq!(classifier.classify("$"), Tag::Label);
    assert_eq!(classifier.classify("See Schedule"), Tag::Label);
    assert_eq!(classifier.classify(""), Tag::Label);
}

#[test]
fn classify_is_deterministic_across_repeated_calls() {
    let classifier = classifier();
    let tokens = ["7,8", "8,818", "$500", "12%", "CA7110", "09-2008", "Towing"];

    let first: Vec<Tag> = tokens.iter().map(|token| classifier.classify(token)).collect();
    let second: Vec<Tag> = tokens.iter().rev().map(|token| classifier.classify(token)).collect();

    for (index, token) in tokens.iter().enumerate() {
        assert_eq!(first[index], second[tokens.len() - 1 - index], "token {token}");
        assert_eq!(first[index], classifier.classify(token));
    }
}

#[test]
fn count_list_shape_requires_short_groups() {
    assert!(is_count_list("7"));
    assert!(is_count_list("7,8"));
    assert!(is_count_list("1, 2, 9"));
    assert!(!is_count_list("8,818"));
    assert!(!is_count_list("818"));
    assert!(!is_count_list("7,x"));
    assert!(!is_count_list(","));
    assert!(!is_count_list(""));
}

#[test]
fn locate_sections_returns_empty_for_absent_marker() {
    let cfg = coverage_test_config();
    let document = lines(&["Quote Proposal", "Named Insured: Sample Trucking LLC"]);

    assert!(locate_sections(&document, &cfg).is_empty());
}

#[test]
fn locate_sections_is_idempotent() {
    let cfg = coverage_test_config();
    let document = lines(&[
        "Coverage Summary",
        "Liability",
        "$1,000,000",
        "End of Coverages",
        "trailer text",
    ]);

    let first = locate_sections(&document, &cfg);
    let second = locate_sections(&document, &cfg);

    assert_eq!(first, second);
    assert_eq!(first[0], lines(&["Liability", "$1,000,000"]));
}

#[test]
fn locate_sections_skips_column_title_rows() {
    let cfg = builtin_config("coverage_schedule");
    let document = lines(&[
        "Schedule of Coverages and Covered Autos",
        "Coverages, Limits & Deductibles",
        "Limits",
        "Covered Autos",
        "Premium",
        "Liability",
        "$1,000,000",
    ]);

    let sections = locate_sections(&document, &cfg);
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0][0], "Liability");
}

#[test]
fn locate_sections_finds_each_repeated_occurrence() {
    let cfg = builtin_config("state_premium_summary");
    let document = lines(&[
        "Schedule of Operations - Louisiana",
        "Terrorism $85",
        "Schedule of Operations - Texas",
        "Terrorism $92",
        "Workers Compensation and Employers Liability Quote Proposal",
    ]);

    let sections = locate_sections(&document, &cfg);
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0], lines(&["Terrorism $85"]));
    assert_eq!(sections[1], lines(&["Terrorism $92"]));
}

#[test]
fn reconstruct_binds_values_in_schema_order() {
    let cfg = coverage_test_config();
    let section = lines(&["Liability", "$1,000,000", "7,8", "Comprehensive", "$500"]);

    let scan = scanner().reconstruct(&cfg, &section);
    let table = assemble_table(&cfg.schema, scan.rows, None);

    assert_eq!(
        table.rows,
        vec![
            lines(&["Liability", "$1,000,000", "7,8"]),
            lines(&["Comprehensive", "$500", ""]),
        ]
    );
}

#[test]
fn reconstruct_emits_label_only_rows_with_empty_values() {
    let cfg = coverage_test_config();
    let section = lines(&["Hired Auto", "Non-Owned Auto", "Medical Payments"]);

    let scan = scanner().reconstruct(&cfg, &section);

    assert_eq!(scan.rows.len(), 3);
    assert_eq!(scan.counters.rows_empty_value, 3);
    for row in &scan.rows {
        assert_eq!(row[1], "");
        assert_eq!(row[2], "");
    }
}

#[test]
fn reconstruct_merges_hyphen_wrapped_labels() {
    let cfg = coverage_test_config();
    let section = lines(&["Hired Auto-", "Liability", "$500"]);

    let scan = scanner().reconstruct(&cfg, &section);

    assert_eq!(scan.counters.continuation_merges, 1);
    assert_eq!(scan.rows.len(), 1);
    assert_eq!(scan.rows[0][0], "Hired Auto Liability");
    assert_eq!(scan.rows[0][1], "$500");
}

#[test]
fn reconstruct_merges_unbalanced_parenthesis_continuations() {
    let cfg = coverage_test_config();
    let section = lines(&["Liability (including owned,", "hired and non-owned autos)", "$750"]);

    let scan = scanner().reconstruct(&cfg, &section);

    assert_eq!(scan.counters.continuation_merges, 1);
    assert_eq!(scan.rows.len(), 1);
    assert_eq!(
        scan.rows[0][0],
        "Liability (including owned, hired and non-owned autos)"
    );
}

#[test]
fn reconstruct_rejoins_lone_currency_marks() {
    let cfg = coverage_test_config();

    let split_lines = lines(&["Towing and Labor", "$", "500"]);
    let scan = scanner().reconstruct(&cfg, &split_lines);
    assert_eq!(scan.counters.currency_rejoins, 1);
    assert_eq!(scan.rows[0][1], "$500");

    let inline = lines(&["Towing and Labor $ 500"]);
    let scan = scanner().reconstruct(&cfg, &inline);
    assert_eq!(scan.counters.currency_rejoins, 1);
    assert_eq!(scan.rows[0][0], "Towing and Labor");
    assert_eq!(scan.rows[0][1], "$500");
}

#[test]
fn reconstruct_excises_see_schedule_back_reference() {
    let cfg = builtin_config("coverage_schedule");
    let section = lines(&["Covered Autos Liability See Schedule 7, 8", "$8,818"]);

    let scan = scanner().reconstruct(&cfg, &section);
    let table = assemble_table(&cfg.schema, scan.rows, None);

    assert_eq!(scan.counters.back_reference_splits, 1);
    assert_eq!(
        table.rows,
        vec![lines(&["Covered Autos Liability", "See Schedule", "7,8", "$8,818"])]
    );
}

#[test]
fn reconstruct_takes_standalone_see_schedule_as_limits_placeholder() {
    let cfg = builtin_config("coverage_schedule");
    let section = lines(&["Comprehensive", "See Schedule 7, 8", "$1,626"]);

    let scan = scanner().reconstruct(&cfg, &section);

    assert_eq!(scan.rows.len(), 1);
    assert_eq!(scan.rows[0][0], "Comprehensive");
    assert_eq!(scan.rows[0][1], "See Schedule");
    assert_eq!(scan.rows[0][2], "7,8");
    assert_eq!(scan.rows[0][3], "$1,626");
}

#[test]
fn reconstruct_reads_location_context_lines() {
    let cfg = builtin_config("location_coverages");
    let section = lines(&[
        "Location: 0001 - 123 Main St",
        "Business Personal Property",
        "$250,000",
        "$1,000",
        "$1,626",
    ]);

    let scan = scanner().reconstruct(&cfg, &section);

    assert_eq!(scan.rows.len(), 1);
    assert_eq!(scan.rows[0][0], "0001 - 123 Main St");
    assert_eq!(scan.rows[0][1], "Business Personal Property");
    assert_eq!(scan.rows[0][2], "$250,000");
    assert_eq!(scan.rows[0][3], "$1,000");
    assert_eq!(scan.rows[0][4], "$1,626");
}

#[test]
fn small_currency_values_skip_the_limit_column() {
    let cfg = builtin_config("additional_coverages");
    let section = lines(&["Employee Benefits Liability", "$250", "$1,200"]);

    let scan = scanner().reconstruct(&cfg, &section);
    let table = assemble_table(&cfg.schema, scan.rows, cfg.value_shift.as_ref());

    // $250 cannot be a limit (too few digits); $1,200 fills the premium.
    assert_eq!(
        table.rows,
        vec![lines(&["Employee Benefits Liability", "", "$250", "$1,200"])]
    );
}

#[test]
fn key_anchored_scan_assembles_vehicle_rows() {
    let cfg = builtin_config("vehicle_schedule");
    let section = lines(&[
        "1",
        "2019",
        "Ford F150",
        "1FTEW1EP5KFA00001",
        "$45,000",
        "2",
        "2021",
        "Freightliner Cascadia",
        "3AKJHHDR5MSMX0001",
    ]);

    let scan = scanner().reconstruct(&cfg, &section);

    assert_eq!(scan.rows.len(), 2);
    assert_eq!(
        scan.rows[0],
        lines(&["1", "2019", "Ford F150", "1FTEW1EP5KFA00001", "$45,000", ""])
    );
    assert_eq!(scan.rows[1][0], "2");
    assert_eq!(scan.rows[1][3], "3AKJHHDR5MSMX0001");
    assert_eq!(scan.rows[1][4], "");
    assert_eq!(scan.counters.rows_empty_value, 1);
}

#[test]
fn key_anchored_scan_parses_deductible_columns() {
    let cfg = builtin_config("vehicle_deductibles");
    let section = lines(&["Veh No. Comp Coll", "1 500 1000", "2 250 500"]);

    let scan = scanner().reconstruct(&cfg, &section);
    let table = assemble_table(&cfg.schema, scan.rows, None);

    assert_eq!(scan.counters.header_lines_skipped, 1);
    assert_eq!(
        table.rows,
        vec![lines(&["1", "$500", "$1,000"]), lines(&["2", "$250", "$500"])]
    );
}

#[test]
fn key_anchored_scan_collects_loss_payee_text() {
    let cfg = builtin_config("loss_payees");
    let section = lines(&["1 First National Bank of Commerce", "2 Ally Financial"]);

    let scan = scanner().reconstruct(&cfg, &section);

    assert_eq!(scan.rows.len(), 2);
    assert_eq!(scan.rows[0], lines(&["1", "First National Bank of Commerce"]));
    assert_eq!(scan.rows[1], lines(&["2", "Ally Financial"]));
}

#[test]
fn edition_anchored_scan_splits_forms_rows_and_continuations() {
    let cfg = builtin_config("policy_forms");
    let section = lines(&[
        "Commercial General Liability Coverage Part",
        "Number Edition Description",
        "CG0001 04-2013 Commercial General Liability Coverage Form",
        "limited coverage for designated premises",
        "CG2012 04-2013 Additional Insured - State or Governmental Agency",
    ]);

    let scan = scanner().reconstruct(&cfg, &section);

    assert_eq!(scan.counters.header_lines_skipped, 1);
    assert_eq!(scan.counters.continuation_merges, 1);
    assert_eq!(scan.rows.len(), 2);
    assert_eq!(scan.rows[0][0], "Commercial General Liability Coverage Part");
    assert_eq!(scan.rows[0][1], "CG0001");
    assert_eq!(scan.rows[0][2], "04-2013");
    assert_eq!(
        scan.rows[0][3],
        "Commercial General Liability Coverage Form limited coverage for designated premises"
    );
    assert_eq!(scan.rows[1][1], "CG2012");
}

#[test]
fn edition_anchored_scan_ignores_lines_outside_known_titles() {
    let cfg = builtin_config("policy_forms");
    let section = lines(&[
        "IL0017 11-1998 Common Policy Conditions",
        "Commercial General Liability Coverage Part",
        "CG0001 04-2013 Commercial General Liability Coverage Form",
        "Commercial Crime Coverage Part",
        "CR0021 08-2013 Commercial Crime Coverage Form",
    ]);

    let scan = scanner().reconstruct(&cfg, &section);

    // Lines before a known title and after an unknown "Commercial " heading
    // are outside any recognized subsection.
    assert_eq!(scan.rows.len(), 1);
    assert_eq!(scan.rows[0][1], "CG0001");
}

#[test]
fn reconcile_prefers_fallback_value_for_empty_primary_cell() {
    let passes = [
        ExtractionPass {
            rows: vec![lines(&["1", ""])],
            trust: TrustLevel::Primary,
        },
        ExtractionPass {
            rows: vec![lines(&["1", "$500"])],
            trust: TrustLevel::Fallback,
        },
    ];

    let (rows, counters) = reconcile(&MERGE_TEST_SCHEMA, &passes).expect("schema has key");

    assert_eq!(rows, vec![lines(&["1", "$500"])]);
    assert_eq!(counters.duplicate_keys_folded, 1);
}

#[test]
fn reconcile_overrides_fallback_with_primary_value() {
    let passes = [
        ExtractionPass {
            rows: vec![lines(&["1", "$500"])],
            trust: TrustLevel::Fallback,
        },
        ExtractionPass {
            rows: vec![lines(&["1", "$750"])],
            trust: TrustLevel::Primary,
        },
    ];

    let (rows, counters) = reconcile(&MERGE_TEST_SCHEMA, &passes).expect("schema has key");

    assert_eq!(rows, vec![lines(&["1", "$750"])]);
    assert_eq!(counters.conflicting_cells_overridden, 1);
}

#[test]
fn reconcile_drops_malformed_keys_and_sorts_numerically() {
    let passes = [ExtractionPass {
        rows: vec![
            lines(&["2", "$b"]),
            lines(&["Total", "$z"]),
            lines(&["1", "$a"]),
            lines(&["", "$x"]),
        ],
        trust: TrustLevel::Primary,
    }];

    let (rows, counters) = reconcile(&MERGE_TEST_SCHEMA, &passes).expect("schema has key");

    assert_eq!(rows, vec![lines(&["1", "$a"]), lines(&["2", "$b"])]);
    assert_eq!(counters.malformed_keys_dropped, 2);
}

#[test]
fn grid_pass_maps_header_titles_and_merges_wrapped_rows() {
    let cfg = builtin_config("vehicle_schedule");
    let spec = cfg.grid.as_ref().expect("vehicle schedule has a grid pass");
    let grid = vec![
        lines(&["Schedule of Covered Autos You Own"]),
        lines(&["No.", "Year", "Model", "VIN Number", "Value"]),
        lines(&["1", "2019", "Ford F150", "1FTEW1EP5KFA00001", "$45,000"]),
        lines(&["", "", "XL Package", "", ""]),
        lines(&["2", "2021", "Freightliner Cascadia", "3AKJHHDR5MSMX0001", "$130,000"]),
        lines(&["Classification (Principal Garage Location)"]),
    ];

    let rows = extract_grid_rows(&grid, &cfg, spec);

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        lines(&["1", "2019", "Ford F150", "1FTEW1EP5KFA00001", "$45,000", ""])
    );
    assert_eq!(rows[1][0], "2");
    assert_eq!(rows[1][4], "$130,000");
}

#[test]
fn vin_detection_cleans_punctuation_and_bounds_length() {
    assert_eq!(
        extract_vin("1FTEW1EP5KFA00001").as_deref(),
        Some("1FTEW1EP5KFA00001")
    );
    assert_eq!(
        extract_vin("(1ftew1ep5kfa00001)").as_deref(),
        Some("1FTEW1EP5KFA00001")
    );
    assert_eq!(extract_vin("F150"), None);
    assert!(looks_like_vin("1FTEW1EP5KFA00001"));
    assert!(!looks_like_vin("FORD"));
}

#[test]
fn relocate_vins_moves_embedded_vin_out_of_model() {
    let cfg = builtin_config("vehicle_schedule");
    let mut rows = vec![lines(&["1", "2019", "Ford F150 1FTEW1EP5KFA00001", "", "", ""])];

    let relocations = scanner().relocate_vins(&cfg, &mut rows);

    assert_eq!(relocations, 1);
    assert_eq!(rows[0][2], "Ford F150");
    assert_eq!(rows[0][3], "1FTEW1EP5KFA00001");
}

#[test]
fn assemble_normalizes_currency_and_percent_cells() {
    assert_eq!(format_currency("8818").as_deref(), Some("$8,818"));
    assert_eq!(format_currency("$8,818").as_deref(), Some("$8,818"));
    assert_eq!(format_currency("1234567.89").as_deref(), Some("$1,234,567.89"));
    assert_eq!(format_currency("See Schedule"), None);
    assert_eq!(format_percent("12%").as_deref(), Some("12%"));
    assert_eq!(format_percent("12.5%").as_deref(), Some("12%"));
    assert_eq!(format_percent("n/a"), None);

    let cfg = coverage_test_config();
    let table = assemble_table(&cfg.schema, vec![lines(&["Liability", "8818", "7,8"])], None);
    assert_eq!(table.rows, vec![lines(&["Liability", "$8,818", "7,8"])]);
}

#[test]
fn assemble_applies_trailing_premium_shift() {
    let cfg = builtin_config("additional_coverages");
    let rows = vec![lines(&["Hired Auto Physical Damage", "", "$500", ""])];

    let table = assemble_table(&cfg.schema, rows, cfg.value_shift.as_ref());

    assert_eq!(
        table.rows,
        vec![lines(&["Hired Auto Physical Damage", "", "", "$500"])]
    );
}

#[test]
fn extract_document_tables_yields_zero_row_tables_for_absent_sections() {
    let configs = catalog::builtin().expect("catalog validates");
    let document = DocumentText {
        lines: lines(&["Quote Proposal", "Named Insured: Sample Trucking LLC"]),
        grid: Vec::new(),
        warnings: Vec::new(),
    };
    let mut counts = ExtractCounts::default();

    let tables = extract_document_tables(&scanner(), &configs, &document, &mut counts)
        .expect("extraction is total");

    assert_eq!(tables.len(), configs.len());
    assert!(tables.iter().all(|table| table.rows.is_empty()));
    assert_eq!(counts.sections_absent_count, configs.len());
    assert_eq!(counts.rows_emitted_count, 0);
}

#[test]
fn extract_document_tables_reconciles_grid_and_scan_passes() {
    let configs = vec![builtin_config("vehicle_schedule")];
    let document = DocumentText {
        lines: lines(&[
            "Schedule of Covered Autos You Own",
            "1",
            "2019",
            "Ford F150",
            "1FTEW1EP5KFA00001",
            "Classification",
        ]),
        grid: vec![
            lines(&["Schedule of Covered Autos You Own"]),
            lines(&["No.", "Year", "Model", "VIN Number", "Value"]),
            lines(&["1", "2019", "Ford F-150", "1FTEW1EP5KFA00001", "$45,000"]),
            lines(&["Classification (Principal Garage Location)"]),
        ],
        warnings: Vec::new(),
    };
    let mut counts = ExtractCounts::default();

    let tables = extract_document_tables(&scanner(), &configs, &document, &mut counts)
        .expect("extraction is total");

    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].rows.len(), 1);
    // The grid pass is primary: its model spelling and value win; the scan
    // pass contributed nothing the grid had not already bound.
    assert_eq!(
        tables[0].rows[0],
        lines(&["1", "2019", "Ford F-150", "1FTEW1EP5KFA00001", "$45,000", ""])
    );
    assert_eq!(counts.grid_pass_row_count, 1);
    assert_eq!(counts.scan_pass_row_count, 1);
    assert_eq!(counts.duplicate_key_fold_count, 1);
}

#[test]
fn catalog_builtin_validates() {
    let configs = catalog::builtin().expect("catalog validates");
    let ids: Vec<&str> = configs.iter().map(|config| config.schema.id).collect();

    assert!(ids.contains(&"coverage_schedule"));
    assert!(ids.contains(&"vehicle_schedule"));
    assert!(ids.contains(&"policy_forms"));
}

#[test]
fn schema_validation_rejects_bad_configurations() {
    let empty = TableSchema { id: "empty", columns: &[], natural_key: None };
    assert!(empty.validate().is_err());

    let duplicated = TableSchema {
        id: "duplicated",
        columns: &[
            ColumnSpec { name: "premium", role: ColumnRole::Description },
            ColumnSpec { name: "premium", role: ColumnRole::Derived },
        ],
        natural_key: None,
    };
    assert!(duplicated.validate().is_err());

    let missing_key = TableSchema {
        id: "missing_key",
        columns: &[ColumnSpec { name: "coverage", role: ColumnRole::Description }],
        natural_key: Some(NaturalKey { column: "veh_no", numeric: true }),
    };
    assert!(missing_key.validate().is_err());
}
