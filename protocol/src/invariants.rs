use serde::Serialize;
use thiserror::Error;

/// Decimal places the service keeps on every percentage field.
pub const PERCENT_DECIMALS: u32 = 2;

// Float slack when comparing against a value parsed from JSON.
const PERCENT_TOLERANCE: f64 = 1e-9;

/// `100 * part / whole`, rounded the way the service rounds.
///
/// The service computes `round(100.0 * part::numeric / nullif(whole, 0), 2)`
/// in exact decimal arithmetic, so an empty denominator yields `None` and
/// halves round up. The quotient is rounded in integers before converting, so
/// values such as 0.145 that `f64` cannot represent still round to 0.15.
pub fn percent(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    let scale = 10u128.pow(PERCENT_DECIMALS);
    let (part, whole) = (u128::from(part), u128::from(whole));
    let scaled = (2 * 100 * scale * part + whole) / (2 * whole);
    Some(scaled as f64 / scale as f64)
}

/// A cross-field rule broken by a row as received from the service.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RowViolation {
    #[error("{row}: {field}={count} exceeds {total_field}={total}")]
    CountExceedsTotal {
        row: String,
        field: &'static str,
        count: u64,
        total_field: &'static str,
        total: u64,
    },
    #[error("{row}: {field} overflows a 64-bit count")]
    CountOverflow { row: String, field: &'static str },
    #[error("{row}: {field}={value} is outside [0, 100]")]
    PercentOutOfRange {
        row: String,
        field: &'static str,
        value: f64,
    },
    #[error("{row}: {field}={actual:?} does not match counts (expected {expected:?})")]
    PercentMismatch {
        row: String,
        field: &'static str,
        actual: Option<f64>,
        expected: Option<f64>,
    },
}

pub(crate) fn check_le(
    out: &mut Vec<RowViolation>,
    row: &str,
    (field, count): (&'static str, u64),
    (total_field, total): (&'static str, u64),
) {
    if count > total {
        out.push(RowViolation::CountExceedsTotal {
            row: row.to_string(),
            field,
            count,
            total_field,
            total,
        });
    }
}

/// [`check_le`] for a sum of two counts. A sum that does not fit in `u64`
/// is reported instead of wrapping.
pub(crate) fn check_sum_le(
    out: &mut Vec<RowViolation>,
    row: &str,
    (field, a, b): (&'static str, u64, u64),
    total: (&'static str, u64),
) {
    match a.checked_add(b) {
        Some(sum) => check_le(out, row, (field, sum), total),
        None => out.push(RowViolation::CountOverflow {
            row: row.to_string(),
            field,
        }),
    }
}

/// Checks a nullable percentage against the counts it was derived from.
pub(crate) fn check_percent(
    out: &mut Vec<RowViolation>,
    row: &str,
    field: &'static str,
    actual: Option<f64>,
    part: u64,
    whole: u64,
) {
    if let Some(value) = actual
        && !(0.0..=100.0).contains(&value)
    {
        out.push(RowViolation::PercentOutOfRange {
            row: row.to_string(),
            field,
            value,
        });
        return;
    }
    let expected = percent(part, whole);
    let consistent = match (actual, expected) {
        (Some(a), Some(e)) => (a - e).abs() <= PERCENT_TOLERANCE,
        (None, None) => true,
        _ => false,
    };
    if !consistent {
        out.push(RowViolation::PercentMismatch {
            row: row.to_string(),
            field,
            actual,
            expected,
        });
    }
}

/// Range check for percentages whose inputs the payload does not carry.
pub(crate) fn check_percent_range(
    out: &mut Vec<RowViolation>,
    row: &str,
    field: &'static str,
    actual: Option<f64>,
) {
    if let Some(value) = actual
        && !(0.0..=100.0).contains(&value)
    {
        out.push(RowViolation::PercentOutOfRange {
            row: row.to_string(),
            field,
            value,
        });
    }
}
