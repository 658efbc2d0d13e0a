use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::report::config::SourceConfig;
use crate::report::error::{Result, ReportError};
use crate::report::model::{MeasurementRecord, RawValue};

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Lists the files in `dir` carrying `extension`, sorted by path.
pub fn discover_sources(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ReportError::NoSourceFiles {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }
    Ok(files)
}

/// Loads every source file into one long-form table.
///
/// Files without a time column or without measurement columns are skipped
/// with a warning, as are files the CSV reader rejects (including text that
/// is not UTF-8 past the preamble). Fails when nothing usable remains.
pub fn read_sources(paths: &[PathBuf], config: &SourceConfig) -> Result<Vec<MeasurementRecord>> {
    let mut table = Vec::new();

    for path in paths {
        info!(path = %path.display(), "reading source file");
        let content = fs::read(path)?;
        match parse_source(&content, config) {
            Ok(SourceOutcome::Records(records)) => {
                debug!(path = %path.display(), rows = records.len(), "source file loaded");
                table.extend(records);
            }
            Ok(SourceOutcome::Skipped(reason)) => {
                warn!(path = %path.display(), %reason, "skipping source file");
            }
            Err(ReportError::Csv(error)) => {
                warn!(path = %path.display(), %error, "skipping unreadable source file");
            }
            Err(other) => return Err(other),
        }
    }

    if table.is_empty() {
        return Err(ReportError::NoSourceData(paths.len()));
    }
    Ok(table)
}

/// What a single source file contributed.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Records(Vec<MeasurementRecord>),
    Skipped(String),
}

/// Parses one wide export: a preamble, a header row holding the time column
/// and one column per measurement, then data rows. Each measurement cell
/// becomes its own record; rows whose timestamp does not parse are dropped.
///
/// Preamble lines are skipped as raw bytes, so they may use any encoding.
pub fn parse_source(content: &[u8], config: &SourceConfig) -> Result<SourceOutcome> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let body = skip_lines(content, config.skip_rows);

    let delimiter = u8::try_from(config.delimiter).unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(body);

    let headers = reader.headers()?.clone();
    let Some(time_index) = headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(config.time_column.trim()))
    else {
        return Ok(SourceOutcome::Skipped(format!(
            "no '{}' column in {:?}",
            config.time_column,
            headers.iter().collect::<Vec<_>>()
        )));
    };

    let value_columns: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(index, header)| {
            *index != time_index
                && !header.is_empty()
                && !config
                    .ignored_columns
                    .iter()
                    .any(|ignored| header.eq_ignore_ascii_case(ignored.trim()))
        })
        .collect();
    if value_columns.is_empty() {
        return Ok(SourceOutcome::Skipped("no measurement columns".to_string()));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let Some(timestamp) = row.get(time_index).and_then(parse_timestamp) else {
            continue;
        };
        for (index, name) in &value_columns {
            let value = row.get(*index).map(RawValue::from).unwrap_or(RawValue::Empty);
            records.push(MeasurementRecord::new(timestamp, *name, value));
        }
    }

    Ok(SourceOutcome::Records(records))
}

/// Parses the timestamp notations found in measurement exports. Date-only
/// values resolve to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn skip_lines(content: &[u8], count: usize) -> &[u8] {
    let mut rest = content;
    for _ in 0..count {
        match rest.iter().position(|byte| *byte == b'\n') {
            Some(index) => rest = &rest[index + 1..],
            None => return &[],
        }
    }
    rest
}
