pub mod config;
pub mod engine;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod service;
pub mod sinks;
pub mod sources;
pub mod store;
pub mod transform;

pub use engine::UsageError;
pub use pipeline::{Envelope, Pipeline};
pub use service::{ReadingChanges, UtilityService};

#[cfg(test)]
mod test_support;
