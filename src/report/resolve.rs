//! Fuzzy matching of requested measurement names against the names found in
//! source data.
//!
//! Matching is tiered and the first tier that yields rows wins:
//!
//! 1. exact equality (case-sensitive, both sides trimmed),
//! 2. case-insensitive substring,
//! 3. every whitespace-separated keyword present as a case-insensitive
//!    substring, in any order.

use crate::report::model::MeasurementRecord;

/// Returns the rows of `table` whose name refers to `source_name`. An empty or
/// all-whitespace request, or an empty table, resolves to nothing.
pub fn resolve<'a>(table: &'a [MeasurementRecord], source_name: &str) -> Vec<&'a MeasurementRecord> {
    let requested = source_name.trim();
    if requested.is_empty() || table.is_empty() {
        return Vec::new();
    }

    let exact: Vec<_> = table
        .iter()
        .filter(|record| record.name.trim() == requested)
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    let needle = requested.to_lowercase();
    let contains: Vec<_> = table
        .iter()
        .filter(|record| record.name.to_lowercase().contains(&needle))
        .collect();
    if !contains.is_empty() {
        return contains;
    }

    let keywords = keywords(requested);
    if keywords.is_empty() {
        return Vec::new();
    }
    table
        .iter()
        .filter(|record| {
            let name = record.name.to_lowercase();
            keywords.iter().all(|keyword| name.contains(keyword.as_str()))
        })
        .collect()
}

/// Lower-cased whitespace-separated keywords of a requested name.
pub(crate) fn keywords(source_name: &str) -> Vec<String> {
    source_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}
