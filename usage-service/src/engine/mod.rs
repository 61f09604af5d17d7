//! Monthly usage derived from sparse meter readings.
//!
//! Usage rows are a materialized view over the readings: whenever a reading
//! changes, the months it can influence are deleted and recomputed by
//! interpolating the readings at each month boundary.

mod bracket;
mod interpolate;
mod recalculate;
pub mod triggers;

use meter_client::domain::CalendarError;
use rust_decimal::Decimal;
use time::Date;

use crate::store::StoreError;

pub use bracket::{find_bracket, Bracket};
pub use interpolate::interpolate;
pub use recalculate::{recalculate, recalculate_window, Recalculation, USAGE_SCALE};
pub use triggers::{on_reading_created, on_reading_deleted, on_reading_updated};

#[derive(thiserror::Error, Debug)]
pub enum UsageError {
    #[error("readings belong to different meters ({first} and {second})")]
    MeterMismatch { first: i64, second: i64 },
    #[error("{target} is outside the reading interval {start}..={end}")]
    OutOfRange { target: Date, start: Date, end: Date },
    #[error("decimal overflow while interpolating at {date}")]
    Overflow { date: Date },
    #[error("reading {value} does not fit the reading column")]
    ReadingOutOfRange { value: Decimal },
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
