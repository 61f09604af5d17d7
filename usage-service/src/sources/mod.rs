pub mod reading_csv_file;

pub use reading_csv_file::ReadingCsvFileSource;

use rust_decimal::Decimal;
use time::Date;

/// A reading as it arrives from outside, with the meter still given by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingRecord {
    pub meter: String,
    pub date: Date,
    pub reading: Decimal,
    pub remark: String,
}
