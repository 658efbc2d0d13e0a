use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::report::aggregate::aggregate;
use crate::report::config::ReportConfig;
use crate::report::error::{Result, ReportError};
use crate::report::grid::{Grid, WriteOutcome};
use crate::report::io::{csv_read, excel_read, template_xlsx};
use crate::report::model::{MappingEntry, MeasurementRecord, TimeWindow};
use crate::report::rank::rank;
use crate::report::resolve::resolve;
use crate::report::template::write_metadata;

const CENTER_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y/%m/%d %H:%M"];

/// Input locations and the requested report time for one run.
#[derive(Debug, Clone)]
pub struct FillRequest {
    pub center: NaiveDateTime,
    /// Minutes on either side of `center`.
    pub minutes: u32,
    pub template: PathBuf,
    pub mapping: PathBuf,
    pub sources: PathBuf,
    pub output_dir: PathBuf,
}

/// Terminal state of a mapping entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryState {
    Written(f64),
    Missing,
}

/// Diagnostic emitted for a mapping entry that resolved to nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissDiagnostic {
    pub source_name: String,
    pub target_cell: String,
    pub candidates: Vec<String>,
}

/// A write that could not be placed anywhere in the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoidWrite {
    pub address: String,
    /// Source name of the mapping entry, or `metadata`.
    pub origin: String,
    pub reason: String,
}

/// Per-grid result of processing all mapping entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillOutcome {
    pub written: usize,
    pub missing: Vec<MissDiagnostic>,
    pub void_writes: Vec<VoidWrite>,
}

impl FillOutcome {
    fn record_write(&mut self, origin: &str, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Void { address, reason } => {
                warn!(%address, %origin, %reason, "write could not be placed");
                self.void_writes.push(VoidWrite {
                    address,
                    origin: origin.to_string(),
                    reason: reason.to_string(),
                });
            }
            WriteOutcome::Redirected { requested, anchor } => {
                debug!(%requested, %anchor, "write redirected to merged anchor");
            }
            WriteOutcome::Written(_) => {}
        }
    }

    /// Source names of every missing entry, in mapping order.
    pub fn missing_names(&self) -> Vec<&str> {
        self.missing
            .iter()
            .map(|miss| miss.source_name.as_str())
            .collect()
    }
}

/// Everything reported back after a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct FillSummary {
    pub output: PathBuf,
    pub sheet: String,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub windowed_rows: usize,
    #[serde(flatten)]
    pub outcome: FillOutcome,
}

/// Parses the requested report time (`YYYY-MM-DD HH:MM` or
/// `YYYY/MM/DD HH:MM`).
pub fn parse_center_time(raw: &str) -> Result<NaiveDateTime> {
    let text = raw.trim();
    CENTER_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .ok_or_else(|| ReportError::InvalidTime(text.to_string()))
}

/// File the report for `center` is saved to.
pub fn output_path(dir: &Path, prefix: &str, center: NaiveDateTime, minutes: u32) -> PathBuf {
    dir.join(format!(
        "{prefix}_{}_pm{minutes}.xlsx",
        center.format("%Y%m%d_%H%M")
    ))
}

/// Resolves, aggregates and writes a single mapping entry.
pub fn fill_entry(
    grid: &mut Grid,
    windowed: &[MeasurementRecord],
    entry: &MappingEntry,
    config: &ReportConfig,
    outcome: &mut FillOutcome,
) -> EntryState {
    let subset = resolve(windowed, &entry.source_name);
    match aggregate(&subset, entry.aggregation) {
        Some(value) => {
            let write = grid.write(&entry.target_cell, value);
            outcome.record_write(&entry.source_name, write);
            outcome.written += 1;
            EntryState::Written(value)
        }
        None => {
            let write = grid.write(&entry.target_cell, config.fill_marker.as_str());
            outcome.record_write(&entry.source_name, write);

            let candidates = if config.report_candidates {
                rank(windowed, &entry.source_name, config.candidate_top_k)
            } else {
                Vec::new()
            };
            if candidates.is_empty() {
                warn!(source = %entry.source_name, "no data in window, no candidates");
            } else {
                warn!(source = %entry.source_name, ?candidates, "no data in window");
            }

            outcome.missing.push(MissDiagnostic {
                source_name: entry.source_name.clone(),
                target_cell: entry.target_cell.clone(),
                candidates,
            });
            EntryState::Missing
        }
    }
}

/// Processes every mapping entry against the windowed table, in order.
#[instrument(level = "debug", skip_all, fields(sheet = %grid.name(), entries = mappings.len()))]
pub fn fill_grid(
    grid: &mut Grid,
    windowed: &[MeasurementRecord],
    mappings: &[MappingEntry],
    config: &ReportConfig,
) -> FillOutcome {
    let mut outcome = FillOutcome::default();
    for entry in mappings {
        fill_entry(grid, windowed, entry, config, &mut outcome);
    }
    outcome
}

/// Runs a complete fill: loads mapping, sources and template, fills the
/// selected sheet and saves the report.
///
/// Every fatal condition is detected before the output file is created.
#[instrument(
    level = "info",
    skip_all,
    fields(center = %request.center, minutes = request.minutes)
)]
pub fn run(request: &FillRequest, config: &ReportConfig) -> Result<FillSummary> {
    let window = TimeWindow::from_minutes(request.center, request.minutes);
    info!(start = %window.start(), end = %window.end(), "time window");

    let mappings = excel_read::read_mapping(&request.mapping, &config.mapping)?;
    info!(rows = mappings.len(), "mapping loaded");
    if config.log_mapping {
        for entry in mappings.iter().take(10) {
            info!(
                source = %entry.source_name,
                target = %entry.target_cell,
                aggregation = %entry.aggregation,
                "mapping row"
            );
        }
    }

    let paths = csv_read::discover_sources(&request.sources, &config.sources.extension)?;
    let table = csv_read::read_sources(&paths, &config.sources)?;
    let windowed = window.select(&table);
    info!(rows = table.len(), windowed_rows = windowed.len(), "sources loaded");
    if windowed.is_empty() {
        warn!("no measurements inside the time window; widen the window or check the report time");
    }

    let mut template = template_xlsx::read_template(&request.template)?;
    let index = template.pick_sheet(&config.target_sheet, &config.fallback_sheet_keyword)?;
    let grid = template
        .sheet_mut(index)
        .ok_or_else(|| ReportError::InvalidWorkbook(format!("sheet index {index} out of range")))?;
    let sheet = grid.name().to_string();
    info!(%sheet, "filling sheet");

    let mut metadata = FillOutcome::default();
    for write in write_metadata(grid, &config.metadata, &window, Local::now().naive_local()) {
        metadata.record_write("metadata", write);
    }
    let mut outcome = fill_grid(grid, &windowed, &mappings, config);
    outcome.void_writes.splice(0..0, metadata.void_writes);

    if config.strict_addressing {
        if let Some(first) = outcome.void_writes.first() {
            return Err(ReportError::VoidWrites {
                count: outcome.void_writes.len(),
                first: first.address.clone(),
            });
        }
    }

    fs::create_dir_all(&request.output_dir)?;
    let output = output_path(
        &request.output_dir,
        &config.output_prefix,
        request.center,
        request.minutes,
    );
    template_xlsx::write_template(&output, &mut template)?;
    info!(
        output = %output.display(),
        written = outcome.written,
        missing = outcome.missing.len(),
        "report saved"
    );

    Ok(FillSummary {
        output,
        sheet,
        window_start: window.start(),
        window_end: window.end(),
        windowed_rows: windowed.len(),
        outcome,
    })
}

/// Persists the run summary, including every miss diagnostic, as JSON.
pub fn write_diagnostics(path: &Path, summary: &FillSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}
