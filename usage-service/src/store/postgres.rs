use meter_client::{
    db::{meter_queries, reading_queries, usage_queries},
    domain::{Meter, NewReading, Reading, Usage, YearMonth},
};
use rust_decimal::Decimal;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Postgres, Transaction,
};
use time::Date;

use crate::config::DatabaseConfig;
use crate::store::{ReadingStore, Store, StoreError, StoreTx};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.uri)
            .await?;
        Ok(Self::new(pool))
    }
}

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl Store for PgStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<PgStoreTx, StoreError> {
        Ok(PgStoreTx {
            tx: self.pool.begin().await?,
        })
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgStoreTx {
    async fn latest_before(
        &mut self,
        meter_id: i64,
        date: Date,
        strict: bool,
    ) -> Result<Option<Reading>, StoreError> {
        Ok(reading_queries::latest_reading_before(&mut *self.tx, meter_id, date, strict).await?)
    }

    async fn earliest_after(
        &mut self,
        meter_id: i64,
        date: Date,
        strict: bool,
    ) -> Result<Option<Reading>, StoreError> {
        Ok(reading_queries::earliest_reading_after(&mut *self.tx, meter_id, date, strict).await?)
    }

    async fn delete_usage_range(
        &mut self,
        meter_id: i64,
        from: YearMonth,
        to: YearMonth,
    ) -> Result<u64, StoreError> {
        Ok(usage_queries::delete_usage_range(&mut *self.tx, meter_id, from, to).await?)
    }

    async fn create_usage(
        &mut self,
        meter_id: i64,
        period: YearMonth,
        usage: Decimal,
    ) -> Result<(), StoreError> {
        usage_queries::insert_usage(&mut *self.tx, meter_id, period, usage)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateUsage { meter_id, period }
                } else {
                    StoreError::Database(e)
                }
            })
    }
}

#[async_trait::async_trait]
impl StoreTx for PgStoreTx {
    async fn insert_meter(&mut self, name: &str, unit: &str) -> Result<Meter, StoreError> {
        meter_queries::insert_meter(&mut *self.tx, name, unit)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateMeterName(name.to_string())
                } else {
                    StoreError::Database(e)
                }
            })
    }

    async fn find_meter(&mut self, meter_id: i64) -> Result<Option<Meter>, StoreError> {
        Ok(meter_queries::find_meter(&mut *self.tx, meter_id).await?)
    }

    async fn find_meter_by_name(&mut self, name: &str) -> Result<Option<Meter>, StoreError> {
        Ok(meter_queries::find_meter_by_name(&mut *self.tx, name).await?)
    }

    async fn lock_meter(&mut self, meter_id: i64) -> Result<Meter, StoreError> {
        meter_queries::lock_meter(&mut *self.tx, meter_id)
            .await?
            .ok_or(StoreError::MeterNotFound(meter_id))
    }

    async fn delete_meter(&mut self, meter_id: i64) -> Result<(), StoreError> {
        match meter_queries::delete_meter(&mut *self.tx, meter_id).await? {
            0 => Err(StoreError::MeterNotFound(meter_id)),
            _ => Ok(()),
        }
    }

    async fn get_reading(&mut self, reading_id: i64) -> Result<Option<Reading>, StoreError> {
        Ok(reading_queries::get_reading(&mut *self.tx, reading_id).await?)
    }

    async fn lock_reading(&mut self, reading_id: i64) -> Result<Reading, StoreError> {
        reading_queries::get_reading_for_update(&mut *self.tx, reading_id)
            .await?
            .ok_or(StoreError::ReadingNotFound(reading_id))
    }

    async fn insert_reading(&mut self, reading: NewReading) -> Result<Reading, StoreError> {
        reading_queries::insert_reading(&mut *self.tx, &reading)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateReading {
                        meter_id: reading.meter_id,
                        date: reading.date,
                    }
                } else {
                    StoreError::Database(e)
                }
            })
    }

    async fn update_reading(&mut self, reading: &Reading) -> Result<(), StoreError> {
        let updated = reading_queries::update_reading(&mut *self.tx, reading)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateReading {
                        meter_id: reading.meter_id,
                        date: reading.date,
                    }
                } else {
                    StoreError::Database(e)
                }
            })?;

        match updated {
            0 => Err(StoreError::ReadingNotFound(reading.id)),
            _ => Ok(()),
        }
    }

    async fn delete_reading(&mut self, reading_id: i64) -> Result<(), StoreError> {
        match reading_queries::delete_reading(&mut *self.tx, reading_id).await? {
            0 => Err(StoreError::ReadingNotFound(reading_id)),
            _ => Ok(()),
        }
    }

    async fn reading_span(&mut self, meter_id: i64) -> Result<Option<(Date, Date)>, StoreError> {
        Ok(reading_queries::reading_span(&mut *self.tx, meter_id).await?)
    }

    async fn list_usages(&mut self, meter_id: i64) -> Result<Vec<Usage>, StoreError> {
        Ok(usage_queries::list_usages(&mut *self.tx, meter_id).await?)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
