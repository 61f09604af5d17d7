//! The reading store the recalculation engine runs against.
//!
//! [`ReadingStore`] is the narrow interface the engine needs; [`StoreTx`]
//! adds the reading and meter mutations that trigger recalculation. All of
//! it happens inside one transaction opened by [`Store::begin`], so a failed
//! recalculation never leaves a half-rewritten usage window behind.

use meter_client::domain::{Meter, NewReading, Reading, Usage, YearMonth};
use rust_decimal::Decimal;
use time::Date;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, MemoryTx};
pub use postgres::PgStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("a reading for meter {meter_id} on {date} already exists")]
    DuplicateReading { meter_id: i64, date: Date },
    #[error("usage for meter {meter_id} in {period} already exists")]
    DuplicateUsage { meter_id: i64, period: YearMonth },
    #[error("meter name '{0}' is already taken")]
    DuplicateMeterName(String),
    #[error("meter {0} does not exist")]
    MeterNotFound(i64),
    #[error("reading {0} does not exist")]
    ReadingNotFound(i64),
}

#[async_trait::async_trait]
pub trait ReadingStore: Send {
    /// Latest reading of the meter before `date`; on `date` too unless `strict`.
    async fn latest_before(
        &mut self,
        meter_id: i64,
        date: Date,
        strict: bool,
    ) -> Result<Option<Reading>, StoreError>;

    /// Earliest reading of the meter after `date`; on `date` too unless `strict`.
    async fn earliest_after(
        &mut self,
        meter_id: i64,
        date: Date,
        strict: bool,
    ) -> Result<Option<Reading>, StoreError>;

    /// Remove usage rows for `from..=to`, returning how many went.
    async fn delete_usage_range(
        &mut self,
        meter_id: i64,
        from: YearMonth,
        to: YearMonth,
    ) -> Result<u64, StoreError>;

    async fn create_usage(
        &mut self,
        meter_id: i64,
        period: YearMonth,
        usage: Decimal,
    ) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait StoreTx: ReadingStore {
    async fn insert_meter(&mut self, name: &str, unit: &str) -> Result<Meter, StoreError>;

    async fn find_meter(&mut self, meter_id: i64) -> Result<Option<Meter>, StoreError>;

    async fn find_meter_by_name(&mut self, name: &str) -> Result<Option<Meter>, StoreError>;

    /// Lock the meter until commit. Fails with `MeterNotFound` for unknown ids.
    async fn lock_meter(&mut self, meter_id: i64) -> Result<Meter, StoreError>;

    async fn delete_meter(&mut self, meter_id: i64) -> Result<(), StoreError>;

    async fn get_reading(&mut self, reading_id: i64) -> Result<Option<Reading>, StoreError>;

    /// Fetch the reading and lock it until commit, so the returned state stays
    /// current. Fails with `ReadingNotFound` for unknown ids.
    async fn lock_reading(&mut self, reading_id: i64) -> Result<Reading, StoreError>;

    async fn insert_reading(&mut self, reading: NewReading) -> Result<Reading, StoreError>;

    async fn update_reading(&mut self, reading: &Reading) -> Result<(), StoreError>;

    async fn delete_reading(&mut self, reading_id: i64) -> Result<(), StoreError>;

    /// Dates of the meter's first and last reading.
    async fn reading_span(&mut self, meter_id: i64) -> Result<Option<(Date, Date)>, StoreError>;

    async fn list_usages(&mut self, meter_id: i64) -> Result<Vec<Usage>, StoreError>;

    async fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}
