use chrono::NaiveDate;
use hr_compliance::compliance::{
    IntervalError, NewTemporalRecord, RangeError, RecordKind, SubjectId, TemporalRegistry,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn employee() -> SubjectId {
    SubjectId("emp-001".to_string())
}

fn record(kind: RecordKind, start: NaiveDate, end: Option<NaiveDate>) -> NewTemporalRecord {
    NewTemporalRecord {
        subject: employee(),
        kind,
        start: Some(start),
        end,
        end_required: false,
    }
}

#[test]
fn employee_history_stays_non_overlapping_across_renewals() {
    let registry = TemporalRegistry::new();

    let trial = registry
        .insert(record(
            RecordKind::EmploymentContract,
            date(2024, 1, 1),
            Some(date(2024, 6, 30)),
        ))
        .expect("trial contract stored");
    let permanent = registry
        .insert(record(RecordKind::EmploymentContract, date(2024, 7, 1), None))
        .expect("permanent contract follows the trial");
    registry
        .insert(record(RecordKind::JobAssignment, date(2024, 1, 1), None))
        .expect("assignments are tracked separately");

    let overlap = registry
        .insert(record(
            RecordKind::EmploymentContract,
            date(2024, 6, 30),
            Some(date(2024, 12, 31)),
        ))
        .expect_err("touching the trial's last day overlaps");
    match overlap {
        IntervalError::Overlap {
            conflicting_id,
            period,
            ..
        } => {
            assert_eq!(conflicting_id, trial.id);
            assert_eq!(period, "from 2024-01-01 to 2024-06-30");
        }
        other => panic!("expected overlap, got {other:?}"),
    }

    let ongoing = registry
        .insert(record(RecordKind::EmploymentContract, date(2026, 1, 1), None))
        .expect_err("permanent contract is still open");
    assert!(ongoing.to_string().contains("present (ongoing)"));

    registry
        .close(permanent.id, date(2025, 12, 31))
        .expect("permanent contract ended");
    registry
        .insert(record(RecordKind::EmploymentContract, date(2026, 1, 1), None))
        .expect("new contract after the end date");

    let current = registry
        .current(&employee(), RecordKind::EmploymentContract, date(2025, 3, 1))
        .expect("lookup succeeds")
        .expect("a contract is in force");
    assert_eq!(current.id, permanent.id);
}

#[test]
fn invalid_ranges_are_reported_without_storing() {
    let registry = TemporalRegistry::new();

    let same_day = registry
        .insert(record(
            RecordKind::ContactChannel,
            date(2025, 1, 1),
            Some(date(2025, 1, 1)),
        ))
        .expect_err("end must be after start");
    assert!(matches!(
        same_day,
        IntervalError::Range(ref errors)
            if errors == &vec![RangeError::EndNotAfterStart {
                start: date(2025, 1, 1),
                end: date(2025, 1, 1),
            }]
    ));

    let mut missing = record(RecordKind::PrimaryAddress, date(2025, 1, 1), None);
    missing.start = None;
    assert!(matches!(
        registry.insert(missing),
        Err(IntervalError::Range(ref errors)) if errors == &vec![RangeError::MissingStart]
    ));

    assert!(registry
        .records_for(&employee(), RecordKind::ContactChannel)
        .expect("lookup succeeds")
        .is_empty());
}
