use super::super::domain::Priority;

/// Contract end dates: a week or less is critical, two weeks high, a month medium.
pub fn contract_priority(days_remaining: i64) -> Priority {
    match days_remaining {
        days if days <= 7 => Priority::Critical,
        days if days <= 14 => Priority::High,
        days if days <= 30 => Priority::Medium,
        _ => Priority::Low,
    }
}

/// Medical visits: already past is critical, within a week high.
pub fn medical_priority(days_remaining: i64) -> Priority {
    match days_remaining {
        days if days < 0 => Priority::Critical,
        days if days <= 7 => Priority::High,
        _ => Priority::Medium,
    }
}

/// Equipment returns: more than a week late is high.
pub fn equipment_priority(days_overdue: i64) -> Priority {
    if days_overdue > 7 {
        Priority::High
    } else {
        Priority::Medium
    }
}

pub(crate) fn plural_days(days: i64) -> String {
    if days.abs() == 1 {
        format!("{days} day")
    } else {
        format!("{days} days")
    }
}
