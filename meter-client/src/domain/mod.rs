mod meter;
mod reading;
mod usage;

pub use meter::Meter;
pub use reading::{NewReading, Reading};
pub use usage::{CalendarError, Usage, YearMonth};
