use crate::report::model::{Aggregation, MeasurementRecord, parse_numeric};

/// Collapses the numeric values of `subset` into one scalar.
///
/// Non-numeric values are dropped first. `None` means nothing numeric was
/// left; it is never folded into `0.0` or NaN.
///
/// For [`Aggregation::Last`] records are ordered by timestamp with a stable
/// sort, so among records sharing the latest timestamp the one appearing last
/// in `subset` wins.
pub fn aggregate(subset: &[&MeasurementRecord], mode: Aggregation) -> Option<f64> {
    let mut values: Vec<(chrono::NaiveDateTime, f64)> = subset
        .iter()
        .filter_map(|record| parse_numeric(&record.value).map(|value| (record.timestamp, value)))
        .collect();
    if values.is_empty() {
        return None;
    }

    let result = match mode {
        Aggregation::Last => {
            values.sort_by_key(|(timestamp, _)| *timestamp);
            values.last().map(|(_, value)| *value)?
        }
        Aggregation::Avg => values.iter().map(|(_, value)| value).sum::<f64>() / values.len() as f64,
        Aggregation::Max => values
            .iter()
            .map(|(_, value)| *value)
            .fold(f64::NEG_INFINITY, f64::max),
        Aggregation::Min => values
            .iter()
            .map(|(_, value)| *value)
            .fold(f64::INFINITY, f64::min),
        Aggregation::Sum => values.iter().map(|(_, value)| value).sum(),
    };
    Some(result)
}
