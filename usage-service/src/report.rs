use meter_client::domain::{CalendarError, Usage};
use rust_decimal::Decimal;
use serde::Serialize;

/// Average daily usage for each month of one year.
///
/// `data[0]` is January; months without a usage row are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyProfile {
    pub label: i32,
    pub data: Vec<Option<Decimal>>,
}

impl MonthlyProfile {
    pub fn from_usages(year: i32, usages: &[Usage]) -> Result<Self, CalendarError> {
        let mut data = vec![None; 12];
        for usage in usages.iter().filter(|u| u.year == year) {
            let period = usage.period()?;
            data[usize::from(period.month() - 1)] = Some(usage.usage / Decimal::from(period.days()));
        }
        Ok(Self { label: year, data })
    }
}
