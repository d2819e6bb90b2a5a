//! Error type for `gias-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date parse error: {0}")]
  DateParse(String),

  /// A stored discriminant (entity type, event kind) is not recognised.
  #[error("unknown {what}: {value:?}")]
  UnknownValue { what: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
