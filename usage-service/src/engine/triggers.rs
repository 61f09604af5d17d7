//! Entry points called after every reading mutation, inside the mutation's
//! transaction.

use meter_client::domain::Reading;

use super::{recalculate, Recalculation, UsageError};
use crate::store::ReadingStore;

fn log_run(event: &'static str, run: &Recalculation) {
    tracing::debug!(
        event,
        meter_id = run.meter_id,
        from = %run.from,
        to = %run.to,
        written = run.written,
        skipped = run.skipped,
        "usage recalculated"
    );
}

pub async fn on_reading_created<S>(store: &mut S, reading: &Reading) -> Result<(), UsageError>
where
    S: ReadingStore + ?Sized,
{
    let run = recalculate(store, reading).await?;
    log_run("created", &run);
    Ok(())
}

/// Call after the update has been written.
///
/// When the reading moved to another meter or date, the months around its
/// old position are recomputed from the readings that remain there before
/// the new position is handled.
pub async fn on_reading_updated<S>(store: &mut S, old: &Reading, new: &Reading) -> Result<(), UsageError>
where
    S: ReadingStore + ?Sized,
{
    if old.meter_id != new.meter_id || old.date != new.date {
        let run = recalculate(store, old).await?;
        log_run("vacated", &run);
    }
    let run = recalculate(store, new).await?;
    log_run("updated", &run);
    Ok(())
}

/// Call after the row has been removed, with its last known state.
pub async fn on_reading_deleted<S>(store: &mut S, snapshot: &Reading) -> Result<(), UsageError>
where
    S: ReadingStore + ?Sized,
{
    let run = recalculate(store, snapshot).await?;
    log_run("deleted", &run);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store, StoreTx};
    use meter_client::domain::NewReading;
    use rust_decimal::Decimal;
    use time::{macros::date, Date};

    fn new_reading(meter_id: i64, date: Date, value: i64) -> NewReading {
        NewReading {
            meter_id,
            date,
            reading: Decimal::from(value),
            remark: String::new(),
        }
    }

    async fn months(tx: &mut impl StoreTx, meter_id: i64) -> Vec<(i32, i32, Decimal)> {
        tx.list_usages(meter_id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| (u.year, u.month, u.usage))
            .collect()
    }

    #[tokio::test]
    async fn creating_second_reading_produces_usage() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let meter = tx.insert_meter("power", "kWh").await.unwrap();

        let first = tx
            .insert_reading(new_reading(meter.id, date!(2018 - 01 - 01), 0))
            .await
            .unwrap();
        on_reading_created(&mut tx, &first).await.unwrap();
        assert!(months(&mut tx, meter.id).await.is_empty());

        let second = tx
            .insert_reading(new_reading(meter.id, date!(2018 - 02 - 01), 10))
            .await
            .unwrap();
        on_reading_created(&mut tx, &second).await.unwrap();
        assert_eq!(
            months(&mut tx, meter.id).await,
            vec![(2018, 1, Decimal::from(10))]
        );
    }

    #[tokio::test]
    async fn deleting_reading_removes_usage_it_supported() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let meter = tx.insert_meter("power", "kWh").await.unwrap();
        for (d, v) in [(date!(2018 - 01 - 01), 0), (date!(2018 - 02 - 01), 10)] {
            let r = tx.insert_reading(new_reading(meter.id, d, v)).await.unwrap();
            on_reading_created(&mut tx, &r).await.unwrap();
        }
        assert_eq!(months(&mut tx, meter.id).await.len(), 1);

        let snapshot = tx
            .latest_before(meter.id, date!(2018 - 02 - 01), false)
            .await
            .unwrap()
            .unwrap();
        tx.delete_reading(snapshot.id).await.unwrap();
        on_reading_deleted(&mut tx, &snapshot).await.unwrap();

        assert!(months(&mut tx, meter.id).await.is_empty());
    }

    #[tokio::test]
    async fn deleting_middle_reading_reinterpolates_across_the_gap() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let meter = tx.insert_meter("gas", "m3").await.unwrap();
        let mut stored = Vec::new();
        for (d, v) in [
            (date!(2018 - 01 - 01), 0),
            (date!(2018 - 02 - 01), 50),
            (date!(2018 - 03 - 01), 59),
        ] {
            let r = tx.insert_reading(new_reading(meter.id, d, v)).await.unwrap();
            on_reading_created(&mut tx, &r).await.unwrap();
            stored.push(r);
        }
        assert_eq!(
            months(&mut tx, meter.id).await,
            vec![(2018, 1, Decimal::from(50)), (2018, 2, Decimal::from(9))]
        );

        tx.delete_reading(stored[1].id).await.unwrap();
        on_reading_deleted(&mut tx, &stored[1]).await.unwrap();

        // 59 units over 59 days: 31 in January, 28 in February.
        assert_eq!(
            months(&mut tx, meter.id).await,
            vec![(2018, 1, Decimal::from(31)), (2018, 2, Decimal::from(28))]
        );
    }

    #[tokio::test]
    async fn reassigning_reading_corrects_both_meters() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let power = tx.insert_meter("power", "kWh").await.unwrap();
        let solar = tx.insert_meter("solar", "kWh").await.unwrap();

        let mut moved = None;
        for (d, v) in [(date!(2018 - 01 - 01), 0), (date!(2018 - 03 - 01), 59)] {
            let r = tx.insert_reading(new_reading(power.id, d, v)).await.unwrap();
            on_reading_created(&mut tx, &r).await.unwrap();
            moved = Some(r);
        }
        let r = tx
            .insert_reading(new_reading(solar.id, date!(2018 - 02 - 01), 0))
            .await
            .unwrap();
        on_reading_created(&mut tx, &r).await.unwrap();
        assert_eq!(months(&mut tx, power.id).await.len(), 2);

        let old = moved.unwrap();
        let new = Reading {
            meter_id: solar.id,
            ..old.clone()
        };
        tx.update_reading(&new).await.unwrap();
        on_reading_updated(&mut tx, &old, &new).await.unwrap();

        // The old meter has a single reading left.
        assert!(months(&mut tx, power.id).await.is_empty());
        assert_eq!(
            months(&mut tx, solar.id).await,
            vec![(2018, 2, Decimal::from(59))]
        );
    }

    #[tokio::test]
    async fn moving_reading_date_clears_vacated_months() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let meter = tx.insert_meter("water", "m3").await.unwrap();
        let mut stored = Vec::new();
        for (d, v) in [
            (date!(2018 - 01 - 01), 0),
            (date!(2018 - 02 - 01), 10),
            (date!(2018 - 03 - 01), 20),
        ] {
            let r = tx.insert_reading(new_reading(meter.id, d, v)).await.unwrap();
            on_reading_created(&mut tx, &r).await.unwrap();
            stored.push(r);
        }

        let old = stored[0].clone();
        let new = Reading {
            date: date!(2018 - 06 - 01),
            reading: Decimal::from(112),
            ..old.clone()
        };
        tx.update_reading(&new).await.unwrap();
        on_reading_updated(&mut tx, &old, &new).await.unwrap();

        // January has no reading on or before its first day any more; from
        // March on the meter advances one unit per day.
        assert_eq!(
            months(&mut tx, meter.id).await,
            vec![
                (2018, 2, Decimal::from(10)),
                (2018, 3, Decimal::from(31)),
                (2018, 4, Decimal::from(30)),
                (2018, 5, Decimal::from(31)),
            ]
        );
    }

    #[tokio::test]
    async fn value_only_update_recalculates_in_place() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let meter = tx.insert_meter("power", "kWh").await.unwrap();
        let mut last = None;
        for (d, v) in [(date!(2018 - 01 - 01), 0), (date!(2018 - 02 - 01), 10)] {
            let r = tx.insert_reading(new_reading(meter.id, d, v)).await.unwrap();
            on_reading_created(&mut tx, &r).await.unwrap();
            last = Some(r);
        }

        let old = last.unwrap();
        let new = Reading {
            reading: Decimal::from(25),
            ..old.clone()
        };
        tx.update_reading(&new).await.unwrap();
        on_reading_updated(&mut tx, &old, &new).await.unwrap();

        assert_eq!(
            months(&mut tx, meter.id).await,
            vec![(2018, 1, Decimal::from(25))]
        );
    }
}
