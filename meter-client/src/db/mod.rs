//! Plain SQL access to the utilities schema (`sql/schema/01_utilities.sql`).
//!
//! Every function takes a `&mut PgConnection` so callers can run them on a
//! pooled connection or inside a transaction (`&mut *tx`).

pub mod meter_queries;
pub mod reading_queries;
pub mod usage_queries;
