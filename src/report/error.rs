use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Error type covering the failures that stop a report run before any output
/// file is produced.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when a delimited source file cannot be tokenised.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors raised while loading or saving the report template.
    #[error("template workbook error: {0}")]
    Template(#[from] umya_spreadsheet::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a workbook does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the mapping workbook lacks a required column or field.
    #[error("invalid mapping: {0}")]
    InvalidMapping(String),

    /// Raised when the requested report time cannot be parsed.
    #[error("invalid report time '{0}': expected YYYY-MM-DD HH:MM")]
    InvalidTime(String),

    /// Raised when the sources directory contains no matching files.
    #[error("no source files with extension '.{extension}' in {}", dir.display())]
    NoSourceFiles { dir: PathBuf, extension: String },

    /// Raised when every source file was skipped or held no timestamped rows.
    #[error("no usable measurement rows found in {0} source file(s)")]
    NoSourceData(usize),

    /// Raised in strict mode when one or more template writes were dropped.
    #[error("{count} template write(s) could not be placed, first at '{first}'")]
    VoidWrites { count: usize, first: String },

    /// Raised when the user provides a path that does not exist.
    #[error("input path not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
