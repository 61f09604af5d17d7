use meter_client::domain::Reading;
use rust_decimal::Decimal;
use time::Date;

use super::UsageError;

/// Linearly interpolate the meter value on `target` from two readings.
///
/// The readings may come in either order. Two readings on the same date
/// bracket only themselves, so the shared value is returned. The result is
/// not rounded; values too large for exact decimal arithmetic give
/// `UsageError::Overflow`.
pub fn interpolate(target: Date, a: &Reading, b: &Reading) -> Result<Decimal, UsageError> {
    if a.meter_id != b.meter_id {
        return Err(UsageError::MeterMismatch {
            first: a.meter_id,
            second: b.meter_id,
        });
    }
    if a.date == b.date {
        return Ok(a.reading);
    }

    let (first, last) = if a.date < b.date { (a, b) } else { (b, a) };
    if target < first.date || target > last.date {
        return Err(UsageError::OutOfRange {
            target,
            start: first.date,
            end: last.date,
        });
    }

    let span = Decimal::from((last.date - first.date).whole_days());
    let elapsed = Decimal::from((target - first.date).whole_days());

    last.reading
        .checked_sub(first.reading)
        .and_then(|rise| rise.checked_mul(elapsed))
        .and_then(|scaled| scaled.checked_div(span))
        .and_then(|delta| first.reading.checked_add(delta))
        .ok_or(UsageError::Overflow { date: target })
}
