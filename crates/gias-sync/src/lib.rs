//! The staging → diff → promote → notify pipeline for the GIAS cache.
//!
//! [`CacheManager`] downloads the full source dataset into dated staging
//! partitions, fans the work out over the processing queues, and reconciles
//! each queued batch against the current partition, publishing created and
//! updated events for whatever changed. The lookup managers in [`lookup`]
//! serve single records outside the pipeline.

mod cancel;

pub mod cache;
pub mod config;
pub mod diff;
pub mod error;
pub mod lookup;
pub mod mapping;

pub use cache::CacheManager;
pub use config::CacheSettings;
pub use error::{BoxError, Error, LookupError, Result};
pub use mapping::GiasMapper;

#[cfg(test)]
mod test_support;
