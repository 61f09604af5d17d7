use meter_client::domain::Reading;
use time::Date;

use crate::store::{ReadingStore, StoreError};

/// The nearest readings strictly before and strictly after a date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bracket {
    pub before: Option<Reading>,
    pub after: Option<Reading>,
}

/// A reading dated exactly `date` is never part of the bracket.
pub async fn find_bracket<S>(store: &mut S, meter_id: i64, date: Date) -> Result<Bracket, StoreError>
where
    S: ReadingStore + ?Sized,
{
    let before = store.latest_before(meter_id, date, true).await?;
    let after = store.earliest_after(meter_id, date, true).await?;
    Ok(Bracket { before, after })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store, StoreTx};
    use meter_client::domain::NewReading;
    use rust_decimal::Decimal;
    use time::macros::date;

    #[tokio::test]
    async fn skips_reading_on_the_date_itself() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let meter = tx.insert_meter("power", "kWh").await.unwrap();
        for (i, d) in [
            date!(2018 - 01 - 01),
            date!(2018 - 02 - 01),
            date!(2018 - 03 - 01),
        ]
        .into_iter()
        .enumerate()
        {
            tx.insert_reading(NewReading {
                meter_id: meter.id,
                date: d,
                reading: Decimal::from(i as i64),
                remark: String::new(),
            })
            .await
            .unwrap();
        }

        let bracket = find_bracket(&mut tx, meter.id, date!(2018 - 02 - 01))
            .await
            .unwrap();
        assert_eq!(bracket.before.unwrap().date, date!(2018 - 01 - 01));
        assert_eq!(bracket.after.unwrap().date, date!(2018 - 03 - 01));
    }

    #[tokio::test]
    async fn open_ends_are_none() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let meter = tx.insert_meter("power", "kWh").await.unwrap();
        tx.insert_reading(NewReading {
            meter_id: meter.id,
            date: date!(2018 - 05 - 10),
            reading: Decimal::ONE,
            remark: String::new(),
        })
        .await
        .unwrap();

        let bracket = find_bracket(&mut tx, meter.id, date!(2018 - 05 - 10))
            .await
            .unwrap();
        assert_eq!(bracket, Bracket::default());

        let later = find_bracket(&mut tx, meter.id, date!(2018 - 06 - 01))
            .await
            .unwrap();
        assert!(later.before.is_some());
        assert!(later.after.is_none());
    }
}
