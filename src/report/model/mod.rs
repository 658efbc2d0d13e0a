use std::fmt;

use chrono::{Duration, NaiveDateTime};

/// Untyped cell content as it arrived from a source file. Numeric coercion is
/// deferred to [`parse_numeric`] so a single bad cell never fails a load.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Textual content, possibly numeric once trimmed.
    Text(String),
    /// Value that was already numeric at the source.
    Number(f64),
    /// Blank cell.
    Empty,
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(value.to_string())
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// Coerces a raw value into a finite float. Blank cells, unparseable text,
/// NaN and infinities all yield `None`.
pub fn parse_numeric(value: &RawValue) -> Option<f64> {
    let number = match value {
        RawValue::Number(number) => *number,
        RawValue::Text(text) => text.trim().parse::<f64>().ok()?,
        RawValue::Empty => return None,
    };
    number.is_finite().then_some(number)
}

/// One (timestamp, name, value) observation from a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub timestamp: NaiveDateTime,
    pub name: String,
    pub value: RawValue,
}

impl MeasurementRecord {
    pub fn new(timestamp: NaiveDateTime, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        Self {
            timestamp,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// How the values matched for a mapping entry collapse into one scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregation {
    /// Value of the chronologically last record.
    #[default]
    Last,
    Avg,
    Max,
    Min,
    Sum,
}

impl Aggregation {
    /// Parses a mode case-insensitively. Returns `None` for anything that is
    /// not one of the five known modes; blank input is treated as `Last`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "" | "LAST" => Some(Aggregation::Last),
            "AVG" => Some(Aggregation::Avg),
            "MAX" => Some(Aggregation::Max),
            "MIN" => Some(Aggregation::Min),
            "SUM" => Some(Aggregation::Sum),
            _ => None,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Last => write!(f, "LAST"),
            Aggregation::Avg => write!(f, "AVG"),
            Aggregation::Max => write!(f, "MAX"),
            Aggregation::Min => write!(f, "MIN"),
            Aggregation::Sum => write!(f, "SUM"),
        }
    }
}

/// Rule binding a requested measurement name to a report cell.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub source_name: String,
    pub target_cell: String,
    pub aggregation: Aggregation,
}

impl MappingEntry {
    pub fn new(
        source_name: impl Into<String>,
        target_cell: impl Into<String>,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            target_cell: target_cell.into(),
            aggregation,
        }
    }
}

/// Closed interval `[center - radius, center + radius]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    center: NaiveDateTime,
    radius: Duration,
}

impl TimeWindow {
    /// Builds a window; a negative radius is clamped to zero.
    pub fn new(center: NaiveDateTime, radius: Duration) -> Self {
        Self {
            center,
            radius: radius.max(Duration::zero()),
        }
    }

    pub fn from_minutes(center: NaiveDateTime, minutes: u32) -> Self {
        Self::new(center, Duration::minutes(i64::from(minutes)))
    }

    pub fn center(&self) -> NaiveDateTime {
        self.center
    }

    pub fn start(&self) -> NaiveDateTime {
        self.center - self.radius
    }

    pub fn end(&self) -> NaiveDateTime {
        self.center + self.radius
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start() <= timestamp && timestamp <= self.end()
    }

    /// Records of `table` that fall inside the window, in table order.
    pub fn select(&self, table: &[MeasurementRecord]) -> Vec<MeasurementRecord> {
        table
            .iter()
            .filter(|record| self.contains(record.timestamp))
            .cloned()
            .collect()
    }
}
