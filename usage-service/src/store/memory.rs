//! In-process store with the same transactional behaviour as PostgreSQL.
//!
//! A transaction holds the store-wide lock and works on a private copy of
//! the state; commit swaps the copy in, dropping the transaction discards it.

use std::{collections::BTreeMap, sync::Arc};

use meter_client::domain::{Meter, NewReading, Reading, Usage, YearMonth};
use rust_decimal::Decimal;
use time::Date;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{ReadingStore, Store, StoreError, StoreTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_meter_id: i64,
    last_reading_id: i64,
    meters: BTreeMap<i64, Meter>,
    readings: BTreeMap<i64, Reading>,
    usages: BTreeMap<(i64, YearMonth), Decimal>,
}

impl MemoryState {
    fn meter_readings(&self, meter_id: i64) -> impl Iterator<Item = &Reading> {
        self.readings.values().filter(move |r| r.meter_id == meter_id)
    }

    fn date_taken(&self, meter_id: i64, date: Date, except: Option<i64>) -> bool {
        self.meter_readings(meter_id)
            .any(|r| r.date == date && Some(r.id) != except)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

#[async_trait::async_trait]
impl ReadingStore for MemoryTx {
    async fn latest_before(
        &mut self,
        meter_id: i64,
        date: Date,
        strict: bool,
    ) -> Result<Option<Reading>, StoreError> {
        Ok(self
            .working
            .meter_readings(meter_id)
            .filter(|r| if strict { r.date < date } else { r.date <= date })
            .max_by_key(|r| r.date)
            .cloned())
    }

    async fn earliest_after(
        &mut self,
        meter_id: i64,
        date: Date,
        strict: bool,
    ) -> Result<Option<Reading>, StoreError> {
        Ok(self
            .working
            .meter_readings(meter_id)
            .filter(|r| if strict { r.date > date } else { r.date >= date })
            .min_by_key(|r| r.date)
            .cloned())
    }

    async fn delete_usage_range(
        &mut self,
        meter_id: i64,
        from: YearMonth,
        to: YearMonth,
    ) -> Result<u64, StoreError> {
        let before = self.working.usages.len();
        self.working
            .usages
            .retain(|(m, period), _| !(*m == meter_id && *period >= from && *period <= to));
        Ok((before - self.working.usages.len()) as u64)
    }

    async fn create_usage(
        &mut self,
        meter_id: i64,
        period: YearMonth,
        usage: Decimal,
    ) -> Result<(), StoreError> {
        if !self.working.meters.contains_key(&meter_id) {
            return Err(StoreError::MeterNotFound(meter_id));
        }
        if self.working.usages.contains_key(&(meter_id, period)) {
            return Err(StoreError::DuplicateUsage { meter_id, period });
        }
        self.working.usages.insert((meter_id, period), usage);
        Ok(())
    }
}

#[async_trait::async_trait]
impl StoreTx for MemoryTx {
    async fn insert_meter(&mut self, name: &str, unit: &str) -> Result<Meter, StoreError> {
        if self.working.meters.values().any(|m| m.name == name) {
            return Err(StoreError::DuplicateMeterName(name.to_string()));
        }
        self.working.last_meter_id += 1;
        let meter = Meter {
            id: self.working.last_meter_id,
            name: name.to_string(),
            unit: unit.to_string(),
        };
        self.working.meters.insert(meter.id, meter.clone());
        Ok(meter)
    }

    async fn find_meter(&mut self, meter_id: i64) -> Result<Option<Meter>, StoreError> {
        Ok(self.working.meters.get(&meter_id).cloned())
    }

    async fn find_meter_by_name(&mut self, name: &str) -> Result<Option<Meter>, StoreError> {
        Ok(self.working.meters.values().find(|m| m.name == name).cloned())
    }

    async fn lock_meter(&mut self, meter_id: i64) -> Result<Meter, StoreError> {
        // The whole store is already locked by this transaction.
        self.working
            .meters
            .get(&meter_id)
            .cloned()
            .ok_or(StoreError::MeterNotFound(meter_id))
    }

    async fn delete_meter(&mut self, meter_id: i64) -> Result<(), StoreError> {
        if self.working.meters.remove(&meter_id).is_none() {
            return Err(StoreError::MeterNotFound(meter_id));
        }
        self.working.readings.retain(|_, r| r.meter_id != meter_id);
        self.working.usages.retain(|(m, _), _| *m != meter_id);
        Ok(())
    }

    async fn get_reading(&mut self, reading_id: i64) -> Result<Option<Reading>, StoreError> {
        Ok(self.working.readings.get(&reading_id).cloned())
    }

    async fn lock_reading(&mut self, reading_id: i64) -> Result<Reading, StoreError> {
        self.working
            .readings
            .get(&reading_id)
            .cloned()
            .ok_or(StoreError::ReadingNotFound(reading_id))
    }

    async fn insert_reading(&mut self, reading: NewReading) -> Result<Reading, StoreError> {
        if !self.working.meters.contains_key(&reading.meter_id) {
            return Err(StoreError::MeterNotFound(reading.meter_id));
        }
        if self.working.date_taken(reading.meter_id, reading.date, None) {
            return Err(StoreError::DuplicateReading {
                meter_id: reading.meter_id,
                date: reading.date,
            });
        }
        self.working.last_reading_id += 1;
        let stored = reading.with_id(self.working.last_reading_id);
        self.working.readings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_reading(&mut self, reading: &Reading) -> Result<(), StoreError> {
        if !self.working.readings.contains_key(&reading.id) {
            return Err(StoreError::ReadingNotFound(reading.id));
        }
        if !self.working.meters.contains_key(&reading.meter_id) {
            return Err(StoreError::MeterNotFound(reading.meter_id));
        }
        if self
            .working
            .date_taken(reading.meter_id, reading.date, Some(reading.id))
        {
            return Err(StoreError::DuplicateReading {
                meter_id: reading.meter_id,
                date: reading.date,
            });
        }
        self.working.readings.insert(reading.id, reading.clone());
        Ok(())
    }

    async fn delete_reading(&mut self, reading_id: i64) -> Result<(), StoreError> {
        self.working
            .readings
            .remove(&reading_id)
            .map(|_| ())
            .ok_or(StoreError::ReadingNotFound(reading_id))
    }

    async fn reading_span(&mut self, meter_id: i64) -> Result<Option<(Date, Date)>, StoreError> {
        let dates = self.working.meter_readings(meter_id).map(|r| r.date);
        let span = dates.fold(None, |span: Option<(Date, Date)>, date| match span {
            Some((first, last)) => Some((first.min(date), last.max(date))),
            None => Some((date, date)),
        });
        Ok(span)
    }

    async fn list_usages(&mut self, meter_id: i64) -> Result<Vec<Usage>, StoreError> {
        Ok(self
            .working
            .usages
            .iter()
            .filter(|((m, _), _)| *m == meter_id)
            .map(|((m, period), usage)| Usage {
                meter_id: *m,
                year: period.year(),
                month: i32::from(period.month()),
                usage: *usage,
            })
            .collect())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}
