//! Error types for `gias-sync`.

use chrono::NaiveDate;
use gias_core::{mapping::TargetKind, model::EntityType};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("operation cancelled")]
  Cancelled,

  /// A queued id has no staged row for the batch's point in time.
  #[error("no staged {entity_type} {id} for {point_in_time}")]
  MissingStaging {
    entity_type:   EntityType,
    id:            i64,
    point_in_time: NaiveDate,
  },

  #[error("invalid cache settings: {0}")]
  InvalidSettings(&'static str),

  #[error("mapper produced a {actual} where a {expected} was expected")]
  UnexpectedMapping { expected: TargetKind, actual: TargetKind },

  #[error("core error: {0}")]
  Core(#[from] gias_core::Error),

  #[error("source error: {0}")]
  Source(#[source] BoxError),

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("queue error: {0}")]
  Queue(#[source] BoxError),

  #[error("publish error: {0}")]
  Publish(#[source] BoxError),

  #[error("mapping error: {0}")]
  Mapping(#[source] BoxError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error returned by the point lookup managers.
#[derive(Debug, Error)]
pub enum LookupError {
  /// The identifier was rejected before any collaborator was called.
  #[error("invalid identifier {id:?}: {reason}")]
  Validation { id: String, reason: String },

  #[error(transparent)]
  Failed(#[from] Error),
}
