use std::fmt;

use rust_decimal::Decimal;
use time::{Date, Month};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("month {month} of year {year} is not a calendar month")]
    InvalidMonth { year: i32, month: i32 },
    #[error("date out of range: {0}")]
    OutOfRange(#[from] time::error::ComponentRange),
}

/// Derived consumption of one meter in one calendar month.
///
/// Rows are owned by the recalculation engine; nothing else creates or
/// mutates them.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Usage {
    pub meter_id: i64,
    pub year: i32,
    pub month: i32,
    pub usage: Decimal,
}

impl Usage {
    pub fn period(&self) -> Result<YearMonth, CalendarError> {
        let month = u8::try_from(self.month).map_err(|_| CalendarError::InvalidMonth {
            year: self.year,
            month: self.month,
        })?;
        YearMonth::new(self.year, month)
    }
}

/// A (year, month) pair, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct YearMonth {
    year: i32,
    month: u8,
}

impl YearMonth {
    pub fn new(year: i32, month: u8) -> Result<Self, CalendarError> {
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidMonth {
                year,
                month: i32::from(month),
            });
        }
        Ok(Self { year, month })
    }

    pub fn of(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u8 {
        self.month
    }

    pub fn calendar_month(self) -> Month {
        Month::January.nth_next(self.month - 1)
    }

    /// The following month; December rolls over into January of the next year.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(self) -> Result<Date, CalendarError> {
        Ok(Date::from_calendar_date(self.year, self.calendar_month(), 1)?)
    }

    pub fn days(self) -> u8 {
        self.calendar_month().length(self.year)
    }

    /// Every month from `self` up to and including `last`. Empty when `last`
    /// precedes `self`.
    pub fn through(self, last: YearMonth) -> impl Iterator<Item = YearMonth> {
        std::iter::successors(Some(self), |m| Some(m.next())).take_while(move |m| *m <= last)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
