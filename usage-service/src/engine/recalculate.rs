use meter_client::domain::{Reading, YearMonth};
use rust_decimal::{Decimal, RoundingStrategy};

use super::{find_bracket, interpolate, UsageError};
use crate::store::ReadingStore;

/// Decimal places of a stored usage value.
pub const USAGE_SCALE: u32 = 2;

/// What one recalculation pass did to a meter's usage rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recalculation {
    pub meter_id: i64,
    pub from: YearMonth,
    pub to: YearMonth,
    pub deleted: u64,
    pub written: u32,
    pub skipped: u32,
}

/// Recompute the usage window a reading at `anchor` can influence.
///
/// The window runs from the month of the nearest reading before the anchor
/// to the month of the nearest reading after it; a missing neighbour is
/// replaced by the anchor itself. The anchor does not have to exist in the
/// store any more, which is how deletions and moved readings are handled.
pub async fn recalculate<S>(store: &mut S, anchor: &Reading) -> Result<Recalculation, UsageError>
where
    S: ReadingStore + ?Sized,
{
    let bracket = find_bracket(store, anchor.meter_id, anchor.date).await?;
    let first = bracket.before.as_ref().unwrap_or(anchor);
    let last = bracket.after.as_ref().unwrap_or(anchor);

    recalculate_window(
        store,
        anchor.meter_id,
        YearMonth::of(first.date),
        YearMonth::of(last.date),
    )
    .await
}

/// Delete every usage row of the meter in `from..=to` and recompute each
/// month from the readings currently in the store.
///
/// Months without readings on both sides of both boundaries are skipped and
/// end up without a usage row.
pub async fn recalculate_window<S>(
    store: &mut S,
    meter_id: i64,
    from: YearMonth,
    to: YearMonth,
) -> Result<Recalculation, UsageError>
where
    S: ReadingStore + ?Sized,
{
    let deleted = store.delete_usage_range(meter_id, from, to).await?;

    let mut run = Recalculation {
        meter_id,
        from,
        to,
        deleted,
        written: 0,
        skipped: 0,
    };

    for period in from.through(to) {
        match month_usage(store, meter_id, period).await? {
            Some(usage) => {
                store.create_usage(meter_id, period, usage).await?;
                run.written += 1;
            }
            None => {
                tracing::debug!(meter_id, %period, "insufficient readings to calculate usage");
                run.skipped += 1;
            }
        }
    }

    metrics::counter!("usage_rows_deleted_total").increment(run.deleted);
    metrics::counter!("usage_rows_written_total").increment(u64::from(run.written));
    metrics::counter!("usage_months_skipped_total").increment(u64::from(run.skipped));

    tracing::debug!(
        meter_id,
        from = %run.from,
        to = %run.to,
        deleted = run.deleted,
        written = run.written,
        skipped = run.skipped,
        "usage window recalculated"
    );

    Ok(run)
}

/// Usage of one month, or `None` when the readings do not cover both of its
/// boundaries.
async fn month_usage<S>(store: &mut S, meter_id: i64, period: YearMonth) -> Result<Option<Decimal>, UsageError>
where
    S: ReadingStore + ?Sized,
{
    let month_start = period.first_day()?;
    let month_end = period.next().first_day()?;

    let Some(start_before) = store.latest_before(meter_id, month_start, false).await? else {
        return Ok(None);
    };
    let Some(start_after) = store.earliest_after(meter_id, month_start, true).await? else {
        return Ok(None);
    };
    let Some(end_before) = store.latest_before(meter_id, month_end, true).await? else {
        return Ok(None);
    };
    let Some(end_after) = store.earliest_after(meter_id, month_end, false).await? else {
        return Ok(None);
    };

    let start = interpolate(month_start, &start_before, &start_after)?;
    let end = interpolate(month_end, &end_before, &end_after)?;

    let usage = end
        .checked_sub(start)
        .ok_or(UsageError::Overflow { date: month_end })?;

    Ok(Some(usage.round_dp_with_strategy(
        USAGE_SCALE,
        RoundingStrategy::MidpointAwayFromZero,
    )))
}
