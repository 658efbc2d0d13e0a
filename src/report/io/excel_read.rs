use std::path::Path;

use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use tracing::warn;

use crate::report::config::MappingConfig;
use crate::report::error::{Result, ReportError};
use crate::report::model::{Aggregation, MappingEntry};

/// Reads the mapping rows from the configured sheet of the mapping workbook.
///
/// The source and target columns are required. The aggregation column is
/// optional; blank or unrecognised modes fall back to `LAST`. Fully blank
/// rows are skipped, while a row that fills only one of the required fields
/// rejects the whole mapping.
pub fn read_mapping(path: &Path, config: &MappingConfig) -> Result<Vec<MappingEntry>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = read_required_sheet(&mut workbook, &config.sheet)?;

    let headers: Vec<String> = match range.rows().next() {
        Some(first_row) => first_row
            .iter()
            .map(|cell| cell_to_string(Some(cell)).trim().to_string())
            .collect(),
        None => Vec::new(),
    };
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name.trim()))
    };

    let source_idx = column(&config.source_column).ok_or_else(|| {
        ReportError::InvalidMapping(format!(
            "sheet '{}' must contain a '{}' column",
            config.sheet, config.source_column
        ))
    })?;
    let target_idx = column(&config.target_column).ok_or_else(|| {
        ReportError::InvalidMapping(format!(
            "sheet '{}' must contain a '{}' column",
            config.sheet, config.target_column
        ))
    })?;
    let aggregation_idx = column(&config.aggregation_column);

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut entries = Vec::new();

    for (offset, row) in range.rows().enumerate().skip(1) {
        let line = first_row + offset + 1;
        let source = cell_to_string(row.get(source_idx)).trim().to_string();
        let target = cell_to_string(row.get(target_idx)).trim().to_string();
        if source.is_empty() && target.is_empty() {
            continue;
        }
        if source.is_empty() || target.is_empty() {
            let missing = if source.is_empty() {
                &config.source_column
            } else {
                &config.target_column
            };
            return Err(ReportError::InvalidMapping(format!(
                "row {line} has no value for '{missing}'"
            )));
        }

        let raw_mode = aggregation_idx
            .map(|idx| cell_to_string(row.get(idx)))
            .unwrap_or_default();
        let aggregation = Aggregation::parse(&raw_mode).unwrap_or_else(|| {
            warn!(row = line, mode = %raw_mode.trim(), source = %source, "unrecognised aggregation, using LAST");
            Aggregation::Last
        });

        entries.push(MappingEntry::new(source, target, aggregation));
    }

    Ok(entries)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<Data>> {
    if !workbook.sheet_names().iter().any(|sheet| sheet == name) {
        return Err(ReportError::InvalidWorkbook(format!("missing sheet '{name}'")));
    }
    Ok(workbook.worksheet_range(name)?)
}

fn cell_to_string(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(value)) => value.clone(),
        Some(Data::Float(value)) => value.to_string(),
        Some(Data::Int(value)) => value.to_string(),
        Some(Data::Bool(value)) => value.to_string(),
        Some(Data::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
