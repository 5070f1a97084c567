//! Date-interval validation shared by every temporal record kind.
//!
//! Intervals are closed on both ends; a missing end means the record is still ongoing
//! and extends indefinitely.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// ISO first, then the day-first and month-first layouts found in HR exports.
pub const DEFAULT_DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub id: u64,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl Interval {
    pub fn new(id: u64, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self { id, start, end }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    fn contains(&self, point: Bound) -> bool {
        Bound::Date(self.start) <= point && point <= Bound::from_end(self.end)
    }
}

/// A point on the timeline where `Infinite` stands in for an open end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bound {
    Date(NaiveDate),
    Infinite,
}

impl Bound {
    fn from_end(end: Option<NaiveDate>) -> Self {
        end.map_or(Self::Infinite, Self::Date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("start date is required")]
    MissingStart,
    #[error("end date is required")]
    MissingEnd,
    #[error("end date {end} must be after start date {start}")]
    EndNotAfterStart { start: NaiveDate, end: NaiveDate },
}

/// Check the bounds of a single interval, collecting every violation.
pub fn validate_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    end_required: bool,
) -> Result<(), Vec<RangeError>> {
    let mut errors = Vec::new();

    if start.is_none() {
        errors.push(RangeError::MissingStart);
    }
    if end_required && end.is_none() {
        errors.push(RangeError::MissingEnd);
    }
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            errors.push(RangeError::EndNotAfterStart { start, end });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// First interval in `existing` that overlaps `[start, end]`, skipping `exclude_id`.
///
/// Overlap means the new start falls inside an existing interval, the new end does, or
/// the new interval encloses an existing one. Pass `existing` in a stable order (by
/// start date) for reproducible results.
pub fn check_overlap<'a, I>(
    existing: I,
    start: NaiveDate,
    end: Option<NaiveDate>,
    exclude_id: Option<u64>,
) -> Option<&'a Interval>
where
    I: IntoIterator<Item = &'a Interval>,
{
    let new_start = Bound::Date(start);
    let new_end = Bound::from_end(end);

    existing
        .into_iter()
        .filter(|interval| Some(interval.id) != exclude_id)
        .find(|interval| {
            let start_contained = interval.contains(new_start);
            let end_contained = interval.contains(new_end);
            let encloses = new_start <= Bound::Date(interval.start)
                && Bound::from_end(interval.end) <= new_end;
            start_contained || end_contained || encloses
        })
}

/// Human-readable bounds of a conflicting interval, e.g. `from 2024-01-01 to present (ongoing)`.
pub fn format_conflict_message(conflicting: &Interval) -> String {
    match conflicting.end {
        Some(end) => format!("from {} to {}", conflicting.start, end),
        None => format!("from {} to present (ongoing)", conflicting.start),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{raw}' does not match any accepted date format")]
pub struct UnparseableDate {
    pub raw: String,
}

/// Try each format in order; the first that parses wins.
pub fn parse_date_with(raw: &str, formats: &[&str]) -> Result<NaiveDate, UnparseableDate> {
    let trimmed = raw.trim();
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| UnparseableDate {
            raw: raw.to_string(),
        })
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, UnparseableDate> {
    parse_date_with(raw, &DEFAULT_DATE_FORMATS)
}
