//! SQLite backend for the GIAS cache.
//!
//! One database file holds the staging and current partitions, the tidy-up
//! watermarks, the processing queues and the event outbox. All access goes
//! through [`tokio_rusqlite`] so queries never block the async runtime.

mod encode;
mod schema;

pub mod error;
pub mod outbox;
pub mod queue;
pub mod store;

pub use error::{Error, Result};
pub use outbox::{EventKind, OutboxEvent, SqliteOutbox};
pub use queue::{ReceivedItem, SqliteQueue};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
