//! Strategies and helpers shared by the property tests.

use std::future::Future;

use proptest::prelude::*;
use rust_decimal::Decimal;
use time::{macros::date, Date, Duration};

/// Run a future to completion on a fresh current-thread runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

/// Between one and `max` readings on distinct dates within 2018 and 2019,
/// ordered by date, with two-decimal values between -10 000 and 10 000.
pub fn reading_sets(max: usize) -> impl Strategy<Value = Vec<(Date, Decimal)>> {
    prop::collection::btree_map(0u16..730, -1_000_000i64..1_000_000, 1..=max).prop_map(|days| {
        days.into_iter()
            .map(|(day, cents)| (date!(2018 - 01 - 01) + Duration::days(i64::from(day)), Decimal::new(cents, 2)))
            .collect()
    })
}
