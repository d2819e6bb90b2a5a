//! File-backed adapters and configuration for the `gias-worker` binary.
//!
//! The binary wires these together with the SQLite store and the
//! [`CacheManager`](gias_sync::CacheManager); see `main.rs` for the commands.

pub mod config;
pub mod error;
pub mod source;
pub mod translation;

pub use config::WorkerConfig;
pub use error::Error;
pub use source::FileSource;
pub use translation::TableTranslator;
