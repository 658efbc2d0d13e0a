use chrono::NaiveDateTime;
use umya_spreadsheet::Spreadsheet;

use crate::report::config::MetadataConfig;
use crate::report::error::{Result, ReportError};
use crate::report::grid::{Grid, WriteOutcome};
use crate::report::model::TimeWindow;

/// A report template: the workbook as loaded from disk, styles included, plus
/// one [`Grid`] per worksheet, in workbook order. Fills happen on the grids;
/// saving copies the written cells back into the loaded workbook.
pub struct TemplateWorkbook {
    book: Spreadsheet,
    sheets: Vec<Grid>,
}

impl TemplateWorkbook {
    /// Template with no backing file, e.g. assembled in memory.
    pub fn new(sheets: Vec<Grid>) -> Self {
        Self::from_book(umya_spreadsheet::new_file_empty_worksheet(), sheets)
    }

    pub(crate) fn from_book(book: Spreadsheet, sheets: Vec<Grid>) -> Self {
        Self { book, sheets }
    }

    /// Splits the template into the backing workbook and its grids.
    pub(crate) fn parts_mut(&mut self) -> (&mut Spreadsheet, &[Grid]) {
        (&mut self.book, &self.sheets)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Grid::name).collect()
    }

    pub fn sheet(&self, index: usize) -> Option<&Grid> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Grid> {
        self.sheets.get_mut(index)
    }

    /// Index of the sheet to fill.
    ///
    /// The preferred name is compared ignoring case and whitespace. Failing
    /// that, the first sheet whose upper-cased name contains
    /// `fallback_keyword` is used.
    pub fn pick_sheet(&self, preferred: &str, fallback_keyword: &str) -> Result<usize> {
        let wanted = normalize_sheet_name(preferred);
        if let Some(index) = self
            .sheets
            .iter()
            .position(|sheet| normalize_sheet_name(sheet.name()) == wanted)
        {
            return Ok(index);
        }

        let keyword = fallback_keyword.trim().to_uppercase();
        if !keyword.is_empty() {
            if let Some(index) = self
                .sheets
                .iter()
                .position(|sheet| sheet.name().to_uppercase().contains(&keyword))
            {
                return Ok(index);
            }
        }

        Err(ReportError::InvalidWorkbook(format!(
            "no sheet matches '{preferred}'; available sheets: {:?}",
            self.sheet_names()
        )))
    }
}

fn normalize_sheet_name(name: &str) -> String {
    name.split_whitespace().collect::<String>().to_lowercase()
}

/// Writes the report time and window into `grid`.
///
/// When no metadata cell is configured, a short banner is written to A1:A3,
/// leaving any of those cells that already hold content untouched.
pub fn write_metadata(
    grid: &mut Grid,
    config: &MetadataConfig,
    window: &TimeWindow,
    generated: NaiveDateTime,
) -> Vec<WriteOutcome> {
    let mut outcomes = Vec::new();
    if !config.enabled {
        return outcomes;
    }

    let center = window.center();
    let stamp = center.format("%Y-%m-%d %H:%M").to_string();

    if config.has_explicit_cells() {
        let cells = [
            (&config.datetime_cell, stamp.clone()),
            (&config.date_cell, center.format("%Y-%m-%d").to_string()),
            (&config.time_cell, center.format("%H:%M").to_string()),
        ];
        for (cell, text) in cells {
            if let Some(address) = cell {
                outcomes.push(grid.write(address, text));
            }
        }
        return outcomes;
    }

    let banner = [
        ("A1", format!("Report Time: {stamp}")),
        (
            "A2",
            format!(
                "Window: {} ~ {}",
                window.start().format("%Y-%m-%d %H:%M:%S"),
                window.end().format("%Y-%m-%d %H:%M:%S")
            ),
        ),
        ("A3", format!("Generated: {}", generated.format("%Y-%m-%d %H:%M:%S"))),
    ];
    for (address, text) in banner {
        if grid.is_blank(address) {
            outcomes.push(grid.write(address, text));
        }
    }
    outcomes
}
