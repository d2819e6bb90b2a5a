//! Error types for `gias-core`.

use thiserror::Error;

use crate::{mapping::TargetKind, model::EntityType};

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid management group code {code:?}: {reason}")]
  InvalidManagementGroupCode { code: String, reason: &'static str },

  #[error("cannot map {entity_type} to {target}")]
  UnsupportedMapping { entity_type: EntityType, target: TargetKind },

  #[error("group {uid} has unsupported group type {group_type:?}")]
  UnsupportedGroupType { uid: i64, group_type: Option<String> },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
