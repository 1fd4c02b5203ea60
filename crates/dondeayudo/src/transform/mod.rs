//! Record transformation into canonical [`Point`]s.
//!
//! Two source schemas are understood:
//!
//! - [`ApiRecord`]: records served by the backend list endpoint.
//! - [`LegacyRecord`]: the spreadsheet-export schema of the bundled fallback
//!   dataset.
//!
//! Both are parsed leniently into typed structs and then validated. A record
//! that fails validation yields a [`TransformError`]; batch functions skip it
//! and keep going.

mod api;
mod legacy;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::TransformError;
use crate::point::{Point, Schedule};

pub use api::ApiRecord;
pub use legacy::{legacy_category, LegacyRecord};

/// Splits free-text needs into items.
static NEEDS_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;\n\r•·]+").expect("Invalid regex pattern"));

/// `"<days> | <start> - <end>"`, days optional.
static SCHEDULE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let time = r"(?:\d{1,2}(?:[:.]\d{2})?\s*(?:hrs?\.?|h)?|\?)";
    Regex::new(&format!(
        r"(?i)^(?:(?P<days>[^|]+?)\s*\|\s*)?(?P<start>{time})(?:\s*[-–]\s*|\s+a\s+)(?P<end>{time})$"
    ))
    .expect("Invalid regex pattern")
});

/// Outcome of transforming a batch of records.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Batch {
    /// Records that became points, in input order.
    pub points: Vec<Point>,
    /// Records that were skipped, with the reason.
    pub skipped: Vec<TransformError>,
}

impl Batch {
    /// Total number of records seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len() + self.skipped.len()
    }

    /// Whether the batch saw no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A source schema that can be turned into a [`Point`].
pub trait SourceRecord: DeserializeOwned {
    /// Validate and convert into the canonical schema.
    ///
    /// # Errors
    ///
    /// Returns a [`TransformError`] if the record is not mappable.
    fn into_point(self) -> Result<Point, TransformError>;
}

/// Transform one raw JSON value.
///
/// # Errors
///
/// Returns [`TransformError::Malformed`] if the value does not have the
/// record's shape, or the record's own validation error.
pub fn transform_one<R: SourceRecord>(index: usize, value: Value) -> Result<Point, TransformError> {
    let record: R = serde_json::from_value(value).map_err(|e| TransformError::Malformed {
        index,
        message: e.to_string(),
    })?;
    record.into_point()
}

/// Transform a batch of raw JSON values, skipping the ones that fail.
pub fn transform_batch<R: SourceRecord>(values: Vec<Value>) -> Batch {
    let mut batch = Batch::default();
    for (index, value) in values.into_iter().enumerate() {
        match transform_one::<R>(index, value) {
            Ok(point) => batch.points.push(point),
            Err(err) => {
                debug!("Skipping record: {}", err);
                batch.skipped.push(err);
            }
        }
    }
    batch
}

/// Trim a text field, turning blank into `None`.
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read an identifier that may arrive as a string or a number.
pub(crate) fn value_to_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => clean_text(Some(s.clone())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a coordinate that may arrive as a number or a numeric string.
pub(crate) fn coerce_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

/// Read a yes/no flag that may arrive as a bool or as text.
pub(crate) fn parse_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "si" | "sí" | "true" | "yes" | "1" | "confirmado"
        ),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

/// Parse a backend timestamp (RFC 3339 or `YYYY-MM-DD HH:MM:SS.sssZ`).
pub(crate) fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = value.trim_end_matches('Z');
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Lowercase, trim and de-duplicate tags, keeping first occurrences.
pub(crate) fn normalize_tags<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for item in items {
        let tag = item
            .as_ref()
            .trim()
            .trim_start_matches(['-', '*'])
            .trim()
            .to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Split free-text needs into normalized tags.
#[must_use]
pub fn split_needs(text: &str) -> Vec<String> {
    normalize_tags(NEEDS_SEPARATOR.split(text))
}

/// Read need tags from either a list of strings or a structured needs object.
///
/// Object keys holding lists contribute their items; keys holding `true`
/// or non-empty text contribute the key itself.
pub(crate) fn tags_from_value(value: Option<&Value>) -> Vec<String> {
    let mut raw: Vec<String> = Vec::new();
    match value {
        Some(Value::Array(items)) => {
            raw.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
        }
        Some(Value::String(text)) => return split_needs(text),
        Some(Value::Object(map)) => {
            for (key, value) in map {
                match value {
                    Value::Array(items) => {
                        raw.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                    }
                    Value::Bool(true) => raw.push(key.replace('_', " ")),
                    Value::String(s) if !s.trim().is_empty() => raw.push(key.replace('_', " ")),
                    _ => {}
                }
            }
        }
        _ => {}
    }
    normalize_tags(raw)
}

/// Parse a free-text schedule.
///
/// Blank text yields `None`. Text in the `"<days> | <start> - <end>"` layout
/// is split into its parts; anything else is kept only as `formatted`.
#[must_use]
pub fn parse_schedule(text: Option<&str>) -> Option<Schedule> {
    let formatted = text?.trim();
    if formatted.is_empty() {
        return None;
    }

    let mut schedule = Schedule {
        formatted: formatted.to_string(),
        days: None,
        start: None,
        end: None,
    };

    if let Some(caps) = SCHEDULE_PATTERN.captures(formatted) {
        let part = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty() && s != "?")
        };
        schedule.days = part("days");
        schedule.start = part("start");
        schedule.end = part("end");
    }

    Some(schedule)
}

/// Format schedule parts the way the backend stores them.
#[must_use]
pub fn format_schedule(days: Option<&str>, start: Option<&str>, end: Option<&str>) -> Option<String> {
    fn nonblank(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }
    let (days, start, end) = (nonblank(days), nonblank(start), nonblank(end));

    let mut out = String::new();
    if let Some(days) = days {
        out.push_str(days);
    }
    if start.is_some() || end.is_some() {
        if !out.is_empty() {
            out.push_str(" | ");
        }
        out.push_str(start.unwrap_or("?"));
        out.push_str(" - ");
        out.push_str(end.unwrap_or("?"));
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}
