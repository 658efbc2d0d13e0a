use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::report::error::Result;

/// Run-level tunables, built once and passed by reference into the fill
/// orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Written in place of values that could not be resolved.
    pub fill_marker: String,
    /// Preferred worksheet of the template, matched ignoring case and spaces.
    pub target_sheet: String,
    /// Fallback: first sheet whose upper-cased name contains this keyword.
    pub fallback_sheet_keyword: String,
    pub metadata: MetadataConfig,
    /// Rank near-miss names for entries that resolve to nothing.
    pub report_candidates: bool,
    pub candidate_top_k: usize,
    /// Log the first mapping rows after loading.
    pub log_mapping: bool,
    /// Fail the run instead of saving when a write could not be placed.
    pub strict_addressing: bool,
    pub sources: SourceConfig,
    pub mapping: MappingConfig,
    /// File name prefix of the produced report.
    pub output_prefix: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fill_marker: "NA".to_string(),
            target_sheet: "daily rev0(+cn)".to_string(),
            fallback_sheet_keyword: "CN".to_string(),
            metadata: MetadataConfig::default(),
            report_candidates: true,
            candidate_top_k: 5,
            log_mapping: true,
            strict_addressing: false,
            sources: SourceConfig::default(),
            mapping: MappingConfig::default(),
            output_prefix: "DailyReport".to_string(),
        }
    }
}

impl ReportConfig {
    /// Reads a JSON configuration file; omitted keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Where the report time and window are written in the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,
    /// Receives `YYYY-MM-DD`.
    pub date_cell: Option<String>,
    /// Receives `HH:MM`.
    pub time_cell: Option<String>,
    /// Receives `YYYY-MM-DD HH:MM`.
    pub datetime_cell: Option<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            date_cell: Some("E34".to_string()),
            time_cell: Some("E35".to_string()),
            datetime_cell: None,
        }
    }
}

impl MetadataConfig {
    pub fn has_explicit_cells(&self) -> bool {
        self.date_cell.is_some() || self.time_cell.is_some() || self.datetime_cell.is_some()
    }
}

/// Layout of the delimited measurement exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Preamble lines preceding the header row.
    pub skip_rows: usize,
    pub time_column: String,
    /// Columns that are neither the timestamp nor a measurement.
    pub ignored_columns: Vec<String>,
    pub extension: String,
    pub delimiter: char,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            skip_rows: 6,
            time_column: "time".to_string(),
            ignored_columns: vec!["no.".to_string()],
            extension: "csv".to_string(),
            delimiter: ',',
        }
    }
}

/// Sheet and column names of the mapping workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub sheet: String,
    pub source_column: String,
    pub target_column: String,
    pub aggregation_column: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            sheet: "Map".to_string(),
            source_column: "SourceName".to_string(),
            target_column: "TargetCell".to_string(),
            aggregation_column: "Agg".to_string(),
        }
    }
}
