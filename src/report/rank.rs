use std::collections::BTreeSet;

use crate::report::model::MeasurementRecord;
use crate::report::resolve::keywords;

/// Suggests names from `windowed` that may have been meant by `source_name`.
///
/// Each distinct name scores one point per keyword of `source_name` it
/// contains (case-insensitive). Zero scores are dropped; the rest are ordered
/// by descending score, then ascending name, and truncated to `top_k`.
pub fn rank(windowed: &[MeasurementRecord], source_name: &str, top_k: usize) -> Vec<String> {
    let keywords = keywords(source_name);
    if keywords.is_empty() || windowed.is_empty() {
        return Vec::new();
    }

    let names: BTreeSet<&str> = windowed.iter().map(|record| record.name.as_str()).collect();

    let mut hits: Vec<(usize, &str)> = names
        .into_iter()
        .filter_map(|name| {
            let lowered = name.to_lowercase();
            let score = keywords
                .iter()
                .filter(|keyword| lowered.contains(keyword.as_str()))
                .count();
            (score > 0).then_some((score, name))
        })
        .collect();

    hits.sort_by(|lhs, rhs| rhs.0.cmp(&lhs.0).then_with(|| lhs.1.cmp(rhs.1)));
    hits.into_iter()
        .take(top_k)
        .map(|(_, name)| name.to_string())
        .collect()
}
