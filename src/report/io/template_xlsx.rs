use std::path::Path;

use tracing::{debug, warn};
use umya_spreadsheet::{Cell, Worksheet};

use crate::report::error::{Result, ReportError};
use crate::report::grid::{CellAddress, CellValue, Grid, MergedRegion};
use crate::report::template::TemplateWorkbook;

/// Loads a template workbook with its styles, and builds a [`Grid`] for every
/// worksheet from the cell contents and merged ranges.
pub fn read_template(path: &Path) -> Result<TemplateWorkbook> {
    let book = umya_spreadsheet::reader::xlsx::read(path)?;

    let sheets: Vec<Grid> = book.get_sheet_collection().iter().map(sheet_to_grid).collect();
    if sheets.is_empty() {
        return Err(ReportError::InvalidWorkbook(format!(
            "template {} contains no sheets",
            path.display()
        )));
    }

    Ok(TemplateWorkbook::from_book(book, sheets))
}

/// Saves the template to `path`, changing only the cells the run wrote.
///
/// Every other part of the loaded workbook is saved as it was read: styles,
/// number formats, column widths, merged ranges and untouched formulas.
pub fn write_template(path: &Path, template: &mut TemplateWorkbook) -> Result<()> {
    let (book, grids) = template.parts_mut();

    for grid in grids {
        let sheet = book
            .get_sheet_collection_mut()
            .iter_mut()
            .find(|sheet| sheet.get_name() == grid.name())
            .ok_or_else(|| {
                ReportError::InvalidWorkbook(format!("sheet '{}' is missing from the workbook", grid.name()))
            })?;

        for (address, value) in grid.written_cells() {
            let cell = sheet.get_cell_mut((u32::from(address.col) + 1, address.row + 1));
            match value {
                CellValue::Text(text) => {
                    cell.set_value_string(text.as_str());
                }
                CellValue::Number(number) => {
                    cell.set_value_number(*number);
                }
                CellValue::Bool(flag) => {
                    cell.set_value_bool(*flag);
                }
                CellValue::Formula(formula) => {
                    cell.set_formula(formula.trim_start_matches('=').to_string());
                }
            }
        }
    }

    umya_spreadsheet::writer::xlsx::write(book, path)?;
    Ok(())
}

fn sheet_to_grid(sheet: &Worksheet) -> Grid {
    let mut grid = Grid::new(sheet.get_name());

    for merge in sheet.get_merge_cells() {
        let range = merge.get_range();
        match MergedRegion::parse(&range) {
            Ok(region) => {
                if let Err(error) = grid.add_merge(region) {
                    warn!(sheet = %grid.name(), %error, "ignoring merged region");
                }
            }
            Err(error) => warn!(sheet = %grid.name(), %range, %error, "ignoring merged region"),
        }
    }

    for cell in sheet.get_cell_collection() {
        let Ok(address) = CellAddress::parse(&cell.get_coordinate().get_coordinate()) else {
            continue;
        };
        if grid.is_merge_hidden(address) {
            continue;
        }
        if let Some(value) = cell_value(cell) {
            grid.set(address, value);
        }
    }

    debug!(
        sheet = %grid.name(),
        merged_regions = grid.regions().len(),
        "template sheet loaded"
    );
    grid
}

fn cell_value(cell: &Cell) -> Option<CellValue> {
    let formula = cell.get_formula();
    if !formula.trim().is_empty() {
        return Some(CellValue::Formula(formula.to_string()));
    }

    let text = cell.get_value().to_string();
    if text.is_empty() {
        return None;
    }
    Some(match text.parse::<f64>() {
        Ok(number) if number.is_finite() => CellValue::Number(number),
        _ => CellValue::Text(text),
    })
}
