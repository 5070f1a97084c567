use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::SubjectId;
use super::interval::{check_overlap, format_conflict_message, validate_range, Interval, RangeError};

/// Kinds of dated records that may never overlap for the same subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    EmploymentContract,
    JobAssignment,
    PrimaryAddress,
    ContactChannel,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::EmploymentContract => "employment contract",
            Self::JobAssignment => "job assignment",
            Self::PrimaryAddress => "primary address",
            Self::ContactChannel => "contact channel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalRecord {
    pub id: u64,
    pub subject: SubjectId,
    pub kind: RecordKind,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub active: bool,
    /// Fixed-term records must carry an end date.
    #[serde(default)]
    pub end_required: bool,
}

impl TemporalRecord {
    fn interval(&self) -> Interval {
        Interval::new(self.id, self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemporalRecord {
    pub subject: SubjectId,
    pub kind: RecordKind,
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub end_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    #[error("invalid period: {}", join_range_errors(.0))]
    Range(Vec<RangeError>),
    #[error("{} for {subject} overlaps the existing period {period}", .kind.label())]
    Overlap {
        subject: SubjectId,
        kind: RecordKind,
        conflicting_id: u64,
        period: String,
    },
    #[error("temporal record {0} not found")]
    NotFound(u64),
    #[error("subject and kind of record {0} cannot change")]
    OwnerChanged(u64),
    #[error("temporal record store unavailable")]
    Unavailable,
}

fn join_range_errors(errors: &[RangeError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Default)]
struct Ledger {
    next_id: u64,
    records: BTreeMap<u64, TemporalRecord>,
}

impl Ledger {
    /// Active records of the same subject and kind, ordered by start date.
    fn siblings(&self, subject: &SubjectId, kind: RecordKind) -> Vec<Interval> {
        let mut intervals: Vec<Interval> = self
            .records
            .values()
            .filter(|record| record.active && record.kind == kind && &record.subject == subject)
            .map(TemporalRecord::interval)
            .collect();
        intervals.sort_by_key(|interval| (interval.start, interval.id));
        intervals
    }

    fn guard(&self, candidate: &TemporalRecord, exclude_id: Option<u64>) -> Result<(), IntervalError> {
        validate_range(Some(candidate.start), candidate.end, candidate.end_required)
            .map_err(IntervalError::Range)?;

        if !candidate.active {
            return Ok(());
        }

        let siblings = self.siblings(&candidate.subject, candidate.kind);
        match check_overlap(&siblings, candidate.start, candidate.end, exclude_id) {
            Some(conflict) => Err(IntervalError::Overlap {
                subject: candidate.subject.clone(),
                kind: candidate.kind,
                conflicting_id: conflict.id,
                period: format_conflict_message(conflict),
            }),
            None => Ok(()),
        }
    }
}

/// Write gate for temporal records: every accepted write leaves the active records of a
/// (subject, kind) pair pairwise non-overlapping.
#[derive(Debug, Default)]
pub struct TemporalRegistry {
    ledger: Mutex<Ledger>,
}

impl TemporalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: NewTemporalRecord) -> Result<TemporalRecord, IntervalError> {
        let start = match record.start {
            Some(start) => start,
            None => {
                let mut errors = vec![RangeError::MissingStart];
                if record.end_required && record.end.is_none() {
                    errors.push(RangeError::MissingEnd);
                }
                return Err(IntervalError::Range(errors));
            }
        };

        let mut ledger = self.ledger.lock().map_err(|_| IntervalError::Unavailable)?;
        let candidate = TemporalRecord {
            id: ledger.next_id + 1,
            subject: record.subject,
            kind: record.kind,
            start,
            end: record.end,
            active: true,
            end_required: record.end_required,
        };

        ledger.guard(&candidate, None)?;
        ledger.next_id = candidate.id;
        ledger.records.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    pub fn update(&self, record: TemporalRecord) -> Result<TemporalRecord, IntervalError> {
        let mut ledger = self.ledger.lock().map_err(|_| IntervalError::Unavailable)?;
        let current = ledger
            .records
            .get(&record.id)
            .ok_or(IntervalError::NotFound(record.id))?;
        if current.subject != record.subject || current.kind != record.kind {
            return Err(IntervalError::OwnerChanged(record.id));
        }

        ledger.guard(&record, Some(record.id))?;
        ledger.records.insert(record.id, record.clone());
        Ok(record)
    }

    /// End an ongoing record on `end`.
    pub fn close(&self, id: u64, end: NaiveDate) -> Result<TemporalRecord, IntervalError> {
        let mut record = self.get(id)?;
        record.end = Some(end);
        self.update(record)
    }

    pub fn get(&self, id: u64) -> Result<TemporalRecord, IntervalError> {
        let ledger = self.ledger.lock().map_err(|_| IntervalError::Unavailable)?;
        ledger.records.get(&id).cloned().ok_or(IntervalError::NotFound(id))
    }

    pub fn records_for(
        &self,
        subject: &SubjectId,
        kind: RecordKind,
    ) -> Result<Vec<TemporalRecord>, IntervalError> {
        let ledger = self.ledger.lock().map_err(|_| IntervalError::Unavailable)?;
        let mut records: Vec<TemporalRecord> = ledger
            .records
            .values()
            .filter(|record| record.kind == kind && &record.subject == subject)
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.start, record.id));
        Ok(records)
    }

    /// The record of this kind in force on `date`, if any.
    pub fn current(
        &self,
        subject: &SubjectId,
        kind: RecordKind,
        date: NaiveDate,
    ) -> Result<Option<TemporalRecord>, IntervalError> {
        Ok(self
            .records_for(subject, kind)?
            .into_iter()
            .find(|record| {
                record.active && record.start <= date && record.end.map_or(true, |end| date <= end)
            }))
    }
}
