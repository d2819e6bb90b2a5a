//! Error type for the worker's file-backed adapters.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to read {path:?}: {source}")]
  Io {
    path:   PathBuf,
    source: std::io::Error,
  },

  #[error("failed to parse {path:?}: {source}")]
  Json {
    path:   PathBuf,
    source: serde_json::Error,
  },

  #[error("unknown enumeration {0:?} in translation table")]
  UnknownEnumeration(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
