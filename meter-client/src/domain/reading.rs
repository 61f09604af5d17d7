use rust_decimal::Decimal;
use time::Date;

/// A single dated measurement. At most one exists per (meter, date).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub id: i64,
    pub meter_id: i64,
    pub date: Date,
    pub reading: Decimal,
    pub remark: String,
}

/// A reading that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewReading {
    pub meter_id: i64,
    pub date: Date,
    pub reading: Decimal,
    pub remark: String,
}

impl NewReading {
    pub fn with_id(self, id: i64) -> Reading {
        Reading {
            id,
            meter_id: self.meter_id,
            date: self.date,
            reading: self.reading,
            remark: self.remark,
        }
    }
}

impl Reading {
    pub const MAX_REMARK_LEN: usize = 255;
    /// Decimal places kept by the store for reading values.
    pub const SCALE: u32 = 2;
    /// Digits before the decimal point (`NUMERIC(10, 2)`).
    pub const INTEGER_DIGITS: u32 = 8;

    /// Whether `value` can be stored as a reading without rounding or overflow.
    pub fn fits_column(value: Decimal) -> bool {
        let limit = Decimal::from(10_i64.pow(Self::INTEGER_DIGITS));
        value.normalize().scale() <= Self::SCALE && value.abs() < limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_fit_checks_scale_and_magnitude() {
        assert!(Reading::fits_column(Decimal::new(9_999_999_999, 2)));
        assert!(Reading::fits_column(Decimal::new(-150, 2)));
        assert!(Reading::fits_column(Decimal::new(1_2000, 4)));
        assert!(!Reading::fits_column(Decimal::from(100_000_000)));
        assert!(!Reading::fits_column(Decimal::new(1001, 3)));
        assert!(!Reading::fits_column(Decimal::MAX));
    }
}
