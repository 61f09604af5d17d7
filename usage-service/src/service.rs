//! Reading and meter mutations with their usage recalculation.
//!
//! Every operation runs in its own store transaction: the affected meters are
//! locked, the mutation is written, the matching trigger recomputes usage and
//! only then is the transaction committed. An error at any step drops the
//! transaction, which rolls everything back.

use meter_client::domain::{Meter, NewReading, Reading, Usage, YearMonth};
use rust_decimal::Decimal;
use time::Date;

use crate::engine::{self, Recalculation, UsageError};
use crate::report::MonthlyProfile;
use crate::store::{Store, StoreTx};

/// Fields to change on an existing reading; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingChanges {
    pub meter_id: Option<i64>,
    pub date: Option<Date>,
    pub reading: Option<Decimal>,
    pub remark: Option<String>,
}

impl ReadingChanges {
    fn apply(self, current: &Reading) -> Reading {
        Reading {
            id: current.id,
            meter_id: self.meter_id.unwrap_or(current.meter_id),
            date: self.date.unwrap_or(current.date),
            reading: self.reading.unwrap_or(current.reading),
            remark: self.remark.unwrap_or_else(|| current.remark.clone()),
        }
    }
}

fn check_value(value: Decimal) -> Result<(), UsageError> {
    if Reading::fits_column(value) {
        Ok(())
    } else {
        Err(UsageError::ReadingOutOfRange { value })
    }
}

pub struct UtilityService<S> {
    store: S,
}

impl<S: Store> UtilityService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn add_meter(&self, name: &str, unit: &str) -> Result<Meter, UsageError> {
        let mut tx = self.store.begin().await?;
        let meter = tx.insert_meter(name, unit).await?;
        tx.commit().await?;

        tracing::info!(meter_id = meter.id, name = %meter.name, unit = %meter.unit, "meter added");
        Ok(meter)
    }

    pub async fn meter_by_name(&self, name: &str) -> Result<Option<Meter>, UsageError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.find_meter_by_name(name).await?)
    }

    /// Deletes the meter together with its readings and usages.
    pub async fn remove_meter(&self, meter_id: i64) -> Result<(), UsageError> {
        let mut tx = self.store.begin().await?;
        tx.lock_meter(meter_id).await?;
        tx.delete_meter(meter_id).await?;
        tx.commit().await?;

        tracing::info!(meter_id, "meter removed");
        Ok(())
    }

    pub async fn add_reading(&self, reading: NewReading) -> Result<Reading, UsageError> {
        check_value(reading.reading)?;
        let mut tx = self.store.begin().await?;
        tx.lock_meter(reading.meter_id).await?;
        let stored = tx.insert_reading(reading).await?;
        engine::on_reading_created(&mut tx, &stored).await?;
        tx.commit().await?;

        tracing::info!(
            reading_id = stored.id,
            meter_id = stored.meter_id,
            date = %stored.date,
            reading = %stored.reading,
            "reading added"
        );
        Ok(stored)
    }

    pub async fn edit_reading(&self, reading_id: i64, changes: ReadingChanges) -> Result<Reading, UsageError> {
        if let Some(value) = changes.reading {
            check_value(value)?;
        }
        let mut tx = self.store.begin().await?;
        // The row lock comes first: `old` must be the committed state that a
        // concurrent edit of the same reading left behind.
        let old = tx.lock_reading(reading_id).await?;
        let updated = changes.apply(&old);

        // Ascending id order so two reassignments in opposite directions
        // cannot deadlock.
        let (first, second) = if old.meter_id <= updated.meter_id {
            (old.meter_id, updated.meter_id)
        } else {
            (updated.meter_id, old.meter_id)
        };
        tx.lock_meter(first).await?;
        if second != first {
            tx.lock_meter(second).await?;
        }

        tx.update_reading(&updated).await?;
        engine::on_reading_updated(&mut tx, &old, &updated).await?;
        tx.commit().await?;

        tracing::info!(
            reading_id,
            meter_id = updated.meter_id,
            previous_meter_id = old.meter_id,
            date = %updated.date,
            "reading changed"
        );
        Ok(updated)
    }

    /// Returns the removed reading.
    pub async fn remove_reading(&self, reading_id: i64) -> Result<Reading, UsageError> {
        let mut tx = self.store.begin().await?;
        let snapshot = tx.lock_reading(reading_id).await?;
        tx.lock_meter(snapshot.meter_id).await?;
        tx.delete_reading(reading_id).await?;
        engine::on_reading_deleted(&mut tx, &snapshot).await?;
        tx.commit().await?;

        tracing::info!(reading_id, meter_id = snapshot.meter_id, date = %snapshot.date, "reading removed");
        Ok(snapshot)
    }

    pub async fn usages(&self, meter_id: i64) -> Result<Vec<Usage>, UsageError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_usages(meter_id).await?)
    }

    /// Recompute every usage row of a meter from scratch.
    ///
    /// Covers the whole reading span plus any rows already stored outside
    /// it. Returns `None` when the meter has neither readings nor usages.
    pub async fn rebuild_usage(&self, meter_id: i64) -> Result<Option<Recalculation>, UsageError> {
        let mut tx = self.store.begin().await?;
        tx.lock_meter(meter_id).await?;

        let mut bounds: Option<(YearMonth, YearMonth)> = tx
            .reading_span(meter_id)
            .await?
            .map(|(first, last)| (YearMonth::of(first), YearMonth::of(last)));
        for usage in tx.list_usages(meter_id).await? {
            let period = usage.period()?;
            bounds = Some(match bounds {
                Some((from, to)) => (from.min(period), to.max(period)),
                None => (period, period),
            });
        }

        let Some((from, to)) = bounds else {
            return Ok(None);
        };

        let run = engine::recalculate_window(&mut tx, meter_id, from, to).await?;
        tx.commit().await?;

        tracing::info!(
            meter_id,
            from = %run.from,
            to = %run.to,
            written = run.written,
            skipped = run.skipped,
            "usage rebuilt"
        );
        Ok(Some(run))
    }

    pub async fn monthly_profile(&self, meter_id: i64, year: i32) -> Result<MonthlyProfile, UsageError> {
        let usages = self.usages(meter_id).await?;
        Ok(MonthlyProfile::from_usages(year, &usages)?)
    }
}
