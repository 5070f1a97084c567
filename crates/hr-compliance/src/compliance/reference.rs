//! Sequential code generation shared by rule codes (`CONT-0001`) and alert
//! references (`AL202500001`).
//!
//! The next value is the highest numeric suffix already issued under the prefix plus one.
//! The read-then-write is not atomic on its own: callers hold their store's write lock
//! across generation and insertion.

use chrono::{Datelike, NaiveDate};

pub const RULE_SEQUENCE_WIDTH: usize = 4;
pub const ALERT_SEQUENCE_WIDTH: usize = 5;

/// Next code under `prefix`, zero-padded to `width` digits.
pub fn next_in_sequence<I, S>(prefix: &str, width: usize, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let highest = existing
        .into_iter()
        .filter_map(|code| sequence_suffix(code.as_ref(), prefix))
        .max()
        .unwrap_or(0);

    format!("{prefix}{:0width$}", highest + 1, width = width)
}

fn sequence_suffix(code: &str, prefix: &str) -> Option<u64> {
    let suffix = code.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

pub fn rule_code_prefix(type_prefix: &str) -> String {
    format!("{type_prefix}-")
}

pub fn alert_reference_prefix(today: NaiveDate) -> String {
    format!("AL{:04}", today.year())
}
