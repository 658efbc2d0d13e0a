//! In-memory worksheet grid with merged-region aware cell addressing.
//!
//! Only the anchor (top-left) cell of a merged region ever holds a value.
//! Writes aimed at any other member are redirected to the anchor through an
//! index built as regions are registered. Regions too large to index cell by
//! cell (whole columns, whole sheets) are matched by rectangle instead.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use thiserror::Error;

/// Number of rows in an Excel worksheet.
pub const MAX_ROWS: u32 = 1_048_576;
/// Number of columns in an Excel worksheet (`A` through `XFD`).
pub const MAX_COLS: u16 = 16_384;

/// Regions covering more cells than this are not indexed per member.
const INDEXED_REGION_CELLS: u64 = 4_096;

/// Failures raised while addressing or structuring a grid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell address is empty")]
    EmptyAddress,

    #[error("malformed cell address '{0}'")]
    MalformedAddress(String),

    #[error("cell address '{0}' lies outside the worksheet")]
    OutOfBounds(String),

    #[error("merged region {region} overlaps existing region {existing}")]
    OverlappingMerge { region: String, existing: String },
}

/// Zero-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddress {
    pub row: u32,
    pub col: u16,
}

impl CellAddress {
    pub fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Parses an A1-style reference such as `E34`, `$e$34` or ` AA7 `.
    pub fn parse(raw: &str) -> Result<Self, GridError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(GridError::EmptyAddress);
        }
        let malformed = || GridError::MalformedAddress(text.to_string());

        let stripped: String = text.chars().filter(|ch| *ch != '$').collect();
        let split = stripped
            .find(|ch: char| ch.is_ascii_digit())
            .ok_or_else(malformed)?;
        let (letters, digits) = stripped.split_at(split);
        if letters.is_empty() || !letters.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(malformed());
        }
        if !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(malformed());
        }

        let mut col: u64 = 0;
        for ch in letters.chars() {
            let digit = u64::from(ch.to_ascii_uppercase() as u8 - b'A' + 1);
            col = col * 26 + digit;
            if col > u64::from(MAX_COLS) {
                return Err(GridError::OutOfBounds(text.to_string()));
            }
        }
        let row: u64 = digits
            .parse()
            .map_err(|_| GridError::OutOfBounds(text.to_string()))?;
        if row == 0 || row > u64::from(MAX_ROWS) {
            return Err(GridError::OutOfBounds(text.to_string()));
        }

        Ok(Self::new((row - 1) as u32, (col - 1) as u16))
    }

    /// Column letters for a zero-based column index.
    pub fn column_letters(col: u16) -> String {
        let mut letters = Vec::new();
        let mut n = u32::from(col) + 1;
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        letters.iter().rev().collect()
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_letters(self.col), self.row + 1)
    }
}

/// Content of a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Formula source, with or without the leading `=`.
    Formula(String),
}

impl CellValue {
    /// Blank text counts as an empty cell.
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(text) if text.trim().is_empty())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Rectangular block of cells that behaves as one logical cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedRegion {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl MergedRegion {
    /// Builds a region from two opposite corners in any order.
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellAddress::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// Parses `A1:B2` style ranges.
    pub fn parse(raw: &str) -> Result<Self, GridError> {
        let (first, last) = raw
            .split_once(':')
            .ok_or_else(|| GridError::MalformedAddress(raw.trim().to_string()))?;
        Ok(Self::new(CellAddress::parse(first)?, CellAddress::parse(last)?))
    }

    pub fn anchor(&self) -> CellAddress {
        self.start
    }

    pub fn contains(&self, address: CellAddress) -> bool {
        (self.start.row..=self.end.row).contains(&address.row)
            && (self.start.col..=self.end.col).contains(&address.col)
    }

    pub fn overlaps(&self, other: &MergedRegion) -> bool {
        self.start.row <= other.end.row
            && other.start.row <= self.end.row
            && self.start.col <= other.end.col
            && other.start.col <= self.end.col
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    pub fn cell_count(&self) -> u64 {
        let rows = u64::from(self.end.row - self.start.row) + 1;
        let cols = u64::from(self.end.col - self.start.col) + 1;
        rows * cols
    }

    /// Every address of the region except the anchor.
    pub fn members(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |row| (self.start.col..=self.end.col).map(move |col| CellAddress::new(row, col)))
            .filter(move |address| *address != self.start)
    }
}

impl fmt::Display for MergedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Result of a write through [`Grid::write`].
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The requested cell was written directly.
    Written(CellAddress),
    /// The requested cell sits inside a merged region; its anchor was written.
    Redirected {
        requested: CellAddress,
        anchor: CellAddress,
    },
    /// Nothing was written.
    Void { address: String, reason: GridError },
}

impl WriteOutcome {
    pub fn is_void(&self) -> bool {
        matches!(self, WriteOutcome::Void { .. })
    }
}

/// A named worksheet: sparse cell storage plus its merged regions.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    name: String,
    cells: BTreeMap<CellAddress, CellValue>,
    /// Addresses changed through [`Grid::write`] since the grid was loaded.
    written: BTreeSet<CellAddress>,
    regions: Vec<MergedRegion>,
    /// Non-anchor member address → index into `regions`.
    member_index: HashMap<CellAddress, usize>,
    /// Indices of regions too large for `member_index`.
    wide_regions: Vec<usize>,
}

impl Grid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a merged region. Single-cell regions are accepted and
    /// ignored; overlapping an existing region is an error.
    pub fn add_merge(&mut self, region: MergedRegion) -> Result<(), GridError> {
        if region.is_single_cell() {
            return Ok(());
        }
        if let Some(existing) = self.regions.iter().find(|existing| existing.overlaps(&region)) {
            return Err(GridError::OverlappingMerge {
                region: region.to_string(),
                existing: existing.to_string(),
            });
        }

        let index = self.regions.len();
        self.regions.push(region);
        if region.cell_count() > INDEXED_REGION_CELLS {
            self.wide_regions.push(index);
        } else {
            for member in region.members() {
                self.member_index.insert(member, index);
            }
        }
        Ok(())
    }

    pub fn regions(&self) -> &[MergedRegion] {
        &self.regions
    }

    /// Region that hides `address`, i.e. one it belongs to without being
    /// the anchor.
    fn hiding_region(&self, address: CellAddress) -> Option<&MergedRegion> {
        if let Some(index) = self.member_index.get(&address) {
            return self.regions.get(*index);
        }
        self.wide_regions
            .iter()
            .filter_map(|index| self.regions.get(*index))
            .find(|region| region.contains(address) && region.anchor() != address)
    }

    /// True when `address` is a non-anchor member of a merged region.
    pub fn is_merge_hidden(&self, address: CellAddress) -> bool {
        self.hiding_region(address).is_some()
    }

    /// The address that physically stores the logical cell at `address`.
    pub fn anchor_of(&self, address: CellAddress) -> CellAddress {
        self.hiding_region(address)
            .map(MergedRegion::anchor)
            .unwrap_or(address)
    }

    /// Stores a value at exactly `address`, bypassing redirection. Used when
    /// loading a template from disk.
    pub fn set(&mut self, address: CellAddress, value: CellValue) {
        self.cells.insert(address, value);
    }

    /// Physical content at `address`.
    pub fn get(&self, address: CellAddress) -> Option<&CellValue> {
        self.cells.get(&address)
    }

    /// Physical content at an A1-style address.
    pub fn read(&self, address: &str) -> Option<&CellValue> {
        CellAddress::parse(address)
            .ok()
            .and_then(|address| self.get(address))
    }

    /// True when the logical cell at `address` has no content. Unparseable
    /// addresses count as not blank so callers never write to them.
    pub fn is_blank(&self, address: &str) -> bool {
        match CellAddress::parse(address) {
            Ok(address) => self
                .get(self.anchor_of(address))
                .is_none_or(CellValue::is_blank),
            Err(_) => false,
        }
    }

    /// Writes `value` to the logical cell at `address`.
    pub fn write(&mut self, address: &str, value: impl Into<CellValue>) -> WriteOutcome {
        let requested = match CellAddress::parse(address) {
            Ok(requested) => requested,
            Err(reason) => {
                return WriteOutcome::Void {
                    address: address.trim().to_string(),
                    reason,
                };
            }
        };

        let anchor = self.anchor_of(requested);
        self.cells.insert(anchor, value.into());
        self.written.insert(anchor);
        if anchor == requested {
            WriteOutcome::Written(requested)
        } else {
            WriteOutcome::Redirected { requested, anchor }
        }
    }

    /// Cells changed through [`Grid::write`], in row-major order.
    pub fn written_cells(&self) -> impl Iterator<Item = (CellAddress, &CellValue)> {
        self.written
            .iter()
            .filter_map(|address| self.cells.get(address).map(|value| (*address, value)))
    }
}
