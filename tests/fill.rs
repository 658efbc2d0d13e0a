use std::fs;
use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::{NaiveDate, NaiveDateTime};
use daily_report::ReportError;
use daily_report::config::{MappingConfig, MetadataConfig, ReportConfig, SourceConfig};
use daily_report::fill::{self, EntryState, FillOutcome, FillRequest};
use daily_report::grid::{CellValue, Grid, MergedRegion};
use daily_report::io::csv_read::{self, SourceOutcome};
use daily_report::io::{excel_read, template_xlsx};
use daily_report::model::{Aggregation, MappingEntry, MeasurementRecord, TimeWindow};
use daily_report::template::{TemplateWorkbook, write_metadata};
use rust_xlsxwriter::{Format, Workbook};
use tempfile::tempdir;

const SHEET: &str = "Daily Rev0(+CN)";

const SOURCE_CSV: &str = "\u{feff}Exported by historian\n\
Site,North Plant\n\
Interval,10 min\n\
Unit,mixed\n\
,\n\
,\n\
no.,time,Pump A Flow (m3/h),Tank Level\n\
1,2025-01-01 10:00:00,12.5,3.2\n\
2,2025-01-01 10:10:00,13.0,bad\n\
3,not a time,99,99\n\
4,2025-01-01 11:30:00,50,4.0\n";

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .expect("valid timestamp")
}

fn pump_rows() -> Vec<MeasurementRecord> {
    vec![
        MeasurementRecord::new(at(10, 0), "Pump A Flow", "12.5"),
        MeasurementRecord::new(at(10, 10), "Pump A Flow", "13.0"),
        MeasurementRecord::new(at(10, 10), "Tank Level", "3.5"),
    ]
}

#[test]
fn fill_grid_writes_values_and_markers() {
    let mut grid = Grid::new(SHEET);
    grid.add_merge(MergedRegion::parse("B2:C3").expect("range"))
        .expect("merge");
    let mappings = vec![
        MappingEntry::new("Pump A Flow", "C3", Aggregation::Last),
        MappingEntry::new("pump a flow", "D4", Aggregation::Avg),
        MappingEntry::new("Turbine X", "D5", Aggregation::Last),
        MappingEntry::new("Tank Level", "??", Aggregation::Max),
    ];

    let outcome = fill::fill_grid(&mut grid, &pump_rows(), &mappings, &ReportConfig::default());

    assert_eq!(grid.read("B2"), Some(&CellValue::Number(13.0)));
    assert_eq!(grid.read("D4"), Some(&CellValue::Number(12.75)));
    assert_eq!(grid.read("D5"), Some(&CellValue::Text("NA".into())));
    assert_eq!(outcome.written, 3);
    assert_eq!(outcome.missing_names(), vec!["Turbine X"]);
    assert!(outcome.missing[0].candidates.is_empty());
    assert_eq!(outcome.void_writes.len(), 1);
    assert_eq!(outcome.void_writes[0].origin, "Tank Level");
}

#[test]
fn fill_entry_reaches_exactly_one_terminal_state() {
    let mut grid = Grid::new(SHEET);
    let mut outcome = FillOutcome::default();
    let config = ReportConfig {
        fill_marker: "-".to_string(),
        ..ReportConfig::default()
    };
    let rows = pump_rows();

    let hit = MappingEntry::new("Tank Level", "A1", Aggregation::Sum);
    let miss = MappingEntry::new("Pump B", "A2", Aggregation::Sum);

    assert_eq!(
        fill::fill_entry(&mut grid, &rows, &hit, &config, &mut outcome),
        EntryState::Written(3.5)
    );
    assert_eq!(
        fill::fill_entry(&mut grid, &rows, &miss, &config, &mut outcome),
        EntryState::Missing
    );
    assert_eq!(grid.read("A2"), Some(&CellValue::Text("-".into())));
    assert_eq!(outcome.written, 1);
    assert_eq!(outcome.missing[0].candidates, vec!["Pump A Flow"]);
}

#[test]
fn candidates_can_be_disabled() {
    let mut grid = Grid::new(SHEET);
    let config = ReportConfig {
        report_candidates: false,
        ..ReportConfig::default()
    };
    let mappings = vec![MappingEntry::new("Pump B", "A1", Aggregation::Last)];

    let outcome = fill::fill_grid(&mut grid, &pump_rows(), &mappings, &config);
    assert_eq!(outcome.missing.len(), 1);
    assert!(outcome.missing[0].candidates.is_empty());
}

#[test]
fn later_entries_overwrite_the_same_cell() {
    let mut grid = Grid::new(SHEET);
    let mappings = vec![
        MappingEntry::new("Pump A Flow", "A1", Aggregation::Last),
        MappingEntry::new("Tank Level", "A1", Aggregation::Last),
    ];

    fill::fill_grid(&mut grid, &pump_rows(), &mappings, &ReportConfig::default());
    assert_eq!(grid.read("A1"), Some(&CellValue::Number(3.5)));
}

#[test]
fn source_is_melted_into_long_form() {
    let outcome = csv_read::parse_source(SOURCE_CSV.as_bytes(), &SourceConfig::default()).expect("parsed");
    let SourceOutcome::Records(records) = outcome else {
        panic!("source unexpectedly skipped");
    };

    assert_eq!(records.len(), 6, "row with an unparseable time is dropped");
    assert!(records.iter().all(|record| record.name != "no."));
    assert_eq!(records[0].name, "Pump A Flow (m3/h)");
    assert_eq!(records[0].timestamp, at(10, 0));
    assert_eq!(records[1].name, "Tank Level");
}

#[test]
fn source_without_time_column_is_skipped() {
    let content = "a\nb\nc\nd\ne\nf\nstamp,Flow\n2025-01-01 10:00,1\n";
    let outcome = csv_read::parse_source(content.as_bytes(), &SourceConfig::default()).expect("parsed");
    assert!(matches!(outcome, SourceOutcome::Skipped(_)));
}

#[test]
fn source_without_measurements_is_skipped() {
    let config = SourceConfig {
        skip_rows: 0,
        ..SourceConfig::default()
    };
    let outcome = csv_read::parse_source(b"no.,time\n1,2025-01-01 10:00\n", &config).expect("parsed");
    assert!(matches!(outcome, SourceOutcome::Skipped(_)));
}

#[test]
fn non_utf8_rows_fail_the_csv_reader() {
    let content = b"a\nb\nc\nd\ne\nf\nno.,time,Flow\n1,2025-01-01 10:00,\xff\xfe\n";
    let result = csv_read::parse_source(content, &SourceConfig::default());
    assert!(matches!(result, Err(ReportError::Csv(_))));
}

#[test]
fn preamble_in_another_encoding_is_skipped_unread() {
    let content = b"\xb3\xf8\xaa\xed\nb\nc\nd\ne\nf\ntime,Flow\n2025-01-01 10:00,1.5\n";
    let outcome = csv_read::parse_source(content, &SourceConfig::default()).expect("parsed");
    let SourceOutcome::Records(records) = outcome else {
        panic!("source unexpectedly skipped");
    };
    assert_eq!(records.len(), 1);
}

#[test]
fn timestamps_accept_common_notations() {
    assert_eq!(csv_read::parse_timestamp("2025-01-01 10:05"), Some(at(10, 5)));
    assert_eq!(csv_read::parse_timestamp("2025/01/01 10:05:00"), Some(at(10, 5)));
    assert_eq!(csv_read::parse_timestamp("2025-01-01T10:05:00"), Some(at(10, 5)));
    assert_eq!(csv_read::parse_timestamp("2025-01-01"), Some(at(0, 0)));
    assert_eq!(csv_read::parse_timestamp(""), None);
    assert_eq!(csv_read::parse_timestamp("yesterday"), None);
}

#[test]
fn center_time_accepts_dash_and_slash_dates() {
    assert_eq!(fill::parse_center_time(" 2025-01-01 10:05 ").expect("parsed"), at(10, 5));
    assert_eq!(fill::parse_center_time("2025/01/01 10:05").expect("parsed"), at(10, 5));
    assert!(matches!(fill::parse_center_time(""), Err(ReportError::InvalidTime(_))));
    assert!(matches!(
        fill::parse_center_time("01-01-2025 10:05"),
        Err(ReportError::InvalidTime(_))
    ));
}

#[test]
fn output_name_carries_time_and_window() {
    let path = fill::output_path(Path::new("out"), "DailyReport", at(1, 35), 30);
    assert_eq!(path, Path::new("out").join("DailyReport_20250101_0135_pm30.xlsx"));
}

#[test]
fn sheet_selection_normalises_and_falls_back() {
    let template = TemplateWorkbook::new(vec![
        Grid::new("Cover"),
        Grid::new("Daily Rev0 (+CN)"),
        Grid::new("daily rev1(+cn)"),
    ]);

    assert_eq!(template.pick_sheet("DAILY REV1(+CN)", "CN").expect("picked"), 2);
    assert_eq!(template.pick_sheet("missing", "CN").expect("picked"), 1);
    assert!(matches!(
        template.pick_sheet("missing", "XYZ"),
        Err(ReportError::InvalidWorkbook(_))
    ));
}

#[test]
fn metadata_banner_respects_existing_content() {
    let mut grid = Grid::new(SHEET);
    grid.set(
        daily_report::grid::CellAddress::new(0, 0),
        CellValue::from("Title"),
    );
    let config = MetadataConfig {
        date_cell: None,
        time_cell: None,
        ..MetadataConfig::default()
    };
    let window = TimeWindow::from_minutes(at(10, 0), 30);

    let outcomes = write_metadata(&mut grid, &config, &window, at(12, 0));

    assert_eq!(outcomes.len(), 2);
    assert_eq!(grid.read("A1"), Some(&CellValue::Text("Title".into())));
    assert_eq!(
        grid.read("A2"),
        Some(&CellValue::Text(
            "Window: 2025-01-01 09:30:00 ~ 2025-01-01 10:30:00".into()
        ))
    );
    assert_eq!(
        grid.read("A3"),
        Some(&CellValue::Text("Generated: 2025-01-01 12:00:00".into()))
    );
}

#[test]
fn metadata_cells_go_through_merged_regions() {
    let mut grid = Grid::new(SHEET);
    grid.add_merge(MergedRegion::parse("E34:G34").expect("range"))
        .expect("merge");
    let window = TimeWindow::from_minutes(at(1, 35), 30);

    let outcomes = write_metadata(&mut grid, &MetadataConfig::default(), &window, at(2, 0));

    assert!(outcomes.iter().all(|outcome| !outcome.is_void()));
    assert_eq!(grid.read("E34"), Some(&CellValue::Text("2025-01-01".into())));
    assert_eq!(grid.read("E35"), Some(&CellValue::Text("01:35".into())));
}

fn write_template(path: &Path) {
    let mut workbook = Workbook::new();
    let cover = workbook.add_worksheet();
    cover.set_name("Cover").expect("sheet named");
    cover.write_formula(0, 0, "=1+1").expect("formula written");
    cover
        .write_number_with_format(1, 0, 45658.0, &Format::new().set_num_format("yyyy-mm-dd"))
        .expect("date written");

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET).expect("sheet named");
    sheet.write_string(0, 0, "Daily report").expect("title written");
    sheet
        .merge_range(1, 1, 2, 2, "", &Format::new().set_num_format("0.000"))
        .expect("merge written");
    workbook.save(path).expect("template saved");
}

fn number_format(path: &Path, sheet: &str, cell: &str) -> String {
    let book = umya_spreadsheet::reader::xlsx::read(path).expect("workbook read");
    let worksheet = book.get_sheet_by_name(sheet).expect("sheet present");
    let cell = worksheet.get_cell(cell).expect("cell present");
    cell.get_style()
        .get_number_format()
        .expect("number format")
        .get_format_code()
        .to_string()
}

fn write_mapping(path: &Path, rows: &[[&str; 3]]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Map").expect("sheet named");
    for (col, header) in ["SourceName", "TargetCell", "Agg"].iter().enumerate() {
        sheet.write_string(0, col as u16, *header).expect("header written");
    }
    for (row, cells) in rows.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            if !cell.is_empty() {
                sheet
                    .write_string(row as u32 + 1, col as u16, *cell)
                    .expect("cell written");
            }
        }
    }
    workbook.save(path).expect("mapping saved");
}

#[test]
fn mapping_rows_are_trimmed_and_defaulted() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("mapping.xlsx");
    write_mapping(
        &path,
        &[
            [" Pump A Flow ", " C3 ", "avg"],
            ["", "", ""],
            ["Tank Level", "D5", ""],
            ["Turbine X", "D6", "median"],
        ],
    );

    let entries = excel_read::read_mapping(&path, &MappingConfig::default()).expect("mapping read");

    assert_eq!(
        entries,
        vec![
            MappingEntry::new("Pump A Flow", "C3", Aggregation::Avg),
            MappingEntry::new("Tank Level", "D5", Aggregation::Last),
            MappingEntry::new("Turbine X", "D6", Aggregation::Last),
        ]
    );
}

#[test]
fn mapping_without_target_column_is_rejected() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("mapping.xlsx");
    let config = MappingConfig {
        target_column: "Cell".to_string(),
        ..MappingConfig::default()
    };
    write_mapping(&path, &[["Pump A Flow", "C3", "LAST"]]);

    let result = excel_read::read_mapping(&path, &config);
    assert!(matches!(result, Err(ReportError::InvalidMapping(_))));
}

#[test]
fn mapping_row_missing_a_required_field_is_rejected() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("mapping.xlsx");
    write_mapping(&path, &[["Pump A Flow", "", "LAST"]]);

    let result = excel_read::read_mapping(&path, &MappingConfig::default());
    assert!(matches!(result, Err(ReportError::InvalidMapping(_))));
}

#[test]
fn template_roundtrip_keeps_merges_and_formulas() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("template.xlsx");
    write_template(&path);

    let mut template = template_xlsx::read_template(&path).expect("template read");
    assert_eq!(template.sheet_names(), vec!["Cover", SHEET]);

    let cover = template.sheet(0).expect("cover sheet");
    assert!(matches!(cover.read("A1"), Some(CellValue::Formula(_))));
    assert_eq!(cover.read("A2"), Some(&CellValue::Number(45658.0)));

    let report = template.sheet(1).expect("report sheet");
    assert_eq!(report.regions(), &[MergedRegion::parse("B2:C3").expect("range")]);
    assert_eq!(report.read("A1"), Some(&CellValue::Text("Daily report".into())));

    let copy = temp_dir.path().join("copy.xlsx");
    template_xlsx::write_template(&copy, &mut template).expect("template saved");
    let mut workbook: Xlsx<_> = open_workbook(&copy).expect("copy opened");
    let formulas = workbook.worksheet_formula("Cover").expect("cover formulas");
    assert_eq!(formulas.get_value((0, 0)).map(String::as_str), Some("1+1"));
    assert_eq!(number_format(&copy, "Cover", "A2"), "yyyy-mm-dd");
}

fn prepare_run(dir: &Path, mapping: &[[&str; 3]]) -> FillRequest {
    let template = dir.join("template.xlsx");
    let mapping_path = dir.join("mapping.xlsx");
    let sources = dir.join("sources");
    fs::create_dir_all(&sources).expect("sources directory");
    fs::write(sources.join("plant.csv"), SOURCE_CSV).expect("source written");
    fs::write(sources.join("broken.csv"), "only one line\n").expect("source written");
    fs::write(sources.join("notes.txt"), "ignored").expect("note written");
    write_template(&template);
    write_mapping(&mapping_path, mapping);

    FillRequest {
        center: at(10, 5),
        minutes: 15,
        template,
        mapping: mapping_path,
        sources,
        output_dir: dir.join("output"),
    }
}

#[test]
fn run_fills_report_end_to_end() {
    let temp_dir = tempdir().expect("temporary directory");
    let request = prepare_run(
        temp_dir.path(),
        &[
            ["Pump A Flow", "C3", "LAST"],
            ["tank level", "D5", "AVG"],
            ["Turbine X", "D6", ""],
        ],
    );

    let summary = fill::run(&request, &ReportConfig::default()).expect("report filled");

    assert_eq!(summary.sheet, SHEET);
    assert_eq!(summary.outcome.written, 2);
    assert_eq!(summary.outcome.missing_names(), vec!["Turbine X"]);
    assert!(summary.outcome.void_writes.is_empty());
    assert_eq!(
        summary.output,
        request.output_dir.join("DailyReport_20250101_1005_pm15.xlsx")
    );

    let mut workbook: Xlsx<_> = open_workbook(&summary.output).expect("report opened");
    let range = workbook.worksheet_range(SHEET).expect("report sheet");
    assert_eq!(range.get_value((1, 1)), Some(&Data::Float(13.0)));
    assert_eq!(range.get_value((4, 3)), Some(&Data::Float(3.2)));
    assert_eq!(range.get_value((5, 3)), Some(&Data::String("NA".into())));
    assert_eq!(range.get_value((33, 4)), Some(&Data::String("2025-01-01".into())));
    assert_eq!(range.get_value((34, 4)), Some(&Data::String("10:05".into())));

    workbook.load_merged_regions().expect("merged regions");
    assert_eq!(workbook.merged_regions_by_sheet(SHEET).len(), 1);
    assert_eq!(workbook.sheet_names().len(), 2);
}

#[test]
fn run_keeps_template_formatting() {
    let temp_dir = tempdir().expect("temporary directory");
    let request = prepare_run(temp_dir.path(), &[["Pump A Flow", "C3", "LAST"]]);

    let summary = fill::run(&request, &ReportConfig::default()).expect("report filled");

    assert_eq!(number_format(&summary.output, "Cover", "A2"), "yyyy-mm-dd");
    assert_eq!(number_format(&summary.output, SHEET, "B2"), "0.000");

    let mut workbook: Xlsx<_> = open_workbook(&summary.output).expect("report opened");
    let cover = workbook.worksheet_range("Cover").expect("cover sheet");
    assert!(matches!(cover.get_value((1, 0)), Some(Data::DateTime(_))));
    let report = workbook.worksheet_range(SHEET).expect("report sheet");
    assert_eq!(report.get_value((1, 1)), Some(&Data::Float(13.0)));
}

#[test]
fn run_skips_sources_the_csv_reader_rejects() {
    let temp_dir = tempdir().expect("temporary directory");
    let request = prepare_run(temp_dir.path(), &[["Pump A Flow", "C3", "LAST"]]);
    fs::write(
        request.sources.join("legacy.csv"),
        b"a\nb\nc\nd\ne\nf\ntime,Pump A Flow\n2025-01-01 10:05,\xff\xfe\n".as_slice(),
    )
    .expect("source written");

    let summary = fill::run(&request, &ReportConfig::default()).expect("report filled");

    assert_eq!(summary.outcome.written, 1);
    assert_eq!(summary.windowed_rows, 4);
}

#[test]
fn empty_window_fills_every_entry_with_the_marker() {
    let temp_dir = tempdir().expect("temporary directory");
    let mut request = prepare_run(
        temp_dir.path(),
        &[["Pump A Flow", "C3", "LAST"], ["Tank Level", "D5", "AVG"]],
    );
    request.center = at(18, 0);

    let summary = fill::run(&request, &ReportConfig::default()).expect("report filled");

    assert_eq!(summary.windowed_rows, 0);
    assert_eq!(summary.outcome.written, 0);
    assert_eq!(summary.outcome.missing_names(), vec!["Pump A Flow", "Tank Level"]);

    let mut workbook: Xlsx<_> = open_workbook(&summary.output).expect("report opened");
    let range = workbook.worksheet_range(SHEET).expect("report sheet");
    assert_eq!(range.get_value((1, 1)), Some(&Data::String("NA".into())));
    assert_eq!(range.get_value((4, 3)), Some(&Data::String("NA".into())));
}

#[test]
fn diagnostics_file_lists_misses() {
    let temp_dir = tempdir().expect("temporary directory");
    let request = prepare_run(temp_dir.path(), &[["Pump Flow B", "D6", "LAST"]]);

    let summary = fill::run(&request, &ReportConfig::default()).expect("report filled");
    let diagnostics = temp_dir.path().join("diagnostics.json");
    fill::write_diagnostics(&diagnostics, &summary).expect("diagnostics written");

    let written = fs::read_to_string(&diagnostics).expect("diagnostics read");
    let parsed: serde_json::Value = serde_json::from_str(&written).expect("JSON parsed");
    assert_eq!(parsed["written"], 0);
    assert_eq!(parsed["missing"][0]["source_name"], "Pump Flow B");
    assert_eq!(parsed["missing"][0]["candidates"][0], "Pump A Flow (m3/h)");
}

#[test]
fn strict_mode_refuses_to_save_void_writes() {
    let temp_dir = tempdir().expect("temporary directory");
    let request = prepare_run(temp_dir.path(), &[["Pump A Flow", "nowhere", "LAST"]]);
    let config = ReportConfig {
        strict_addressing: true,
        ..ReportConfig::default()
    };

    let result = fill::run(&request, &config);

    assert!(matches!(result, Err(ReportError::VoidWrites { count: 1, .. })));
    assert!(!request.output_dir.exists());
}

#[test]
fn run_without_sources_stops_before_writing() {
    let temp_dir = tempdir().expect("temporary directory");
    let mut request = prepare_run(temp_dir.path(), &[["Pump A Flow", "C3", "LAST"]]);
    let empty = temp_dir.path().join("empty");
    fs::create_dir_all(&empty).expect("empty directory");
    request.sources = empty;

    let result = fill::run(&request, &ReportConfig::default());

    assert!(matches!(result, Err(ReportError::NoSourceFiles { .. })));
    assert!(!request.output_dir.exists());
}
