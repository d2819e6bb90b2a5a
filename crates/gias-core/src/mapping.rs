//! Mapping from source records to public shapes.
//!
//! Source and target kinds are closed enums, so a [`Mapper`] picks its
//! strategy with a `match` instead of inspecting runtime types. Code values
//! (establishment type, status, ...) are translated through a [`Translator`].

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  domain::{LearningProvider, ManagementGroup},
  model::{EntityType, Establishment, Group, LocalAuthority},
};

// ─── Source / target kinds ───────────────────────────────────────────────────

/// A borrowed source record of any kind.
#[derive(Debug, Clone, Copy)]
pub enum SourceEntity<'a> {
  Establishment(&'a Establishment),
  Group(&'a Group),
  LocalAuthority(&'a LocalAuthority),
}

impl SourceEntity<'_> {
  pub fn entity_type(&self) -> EntityType {
    match self {
      Self::Establishment(_) => EntityType::Establishment,
      Self::Group(_) => EntityType::Group,
      Self::LocalAuthority(_) => EntityType::LocalAuthority,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TargetKind {
  LearningProvider,
  ManagementGroup,
}

/// The output of a [`Mapper`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MappedEntity {
  LearningProvider(LearningProvider),
  ManagementGroup(ManagementGroup),
}

impl MappedEntity {
  pub fn kind(&self) -> TargetKind {
    match self {
      Self::LearningProvider(_) => TargetKind::LearningProvider,
      Self::ManagementGroup(_) => TargetKind::ManagementGroup,
    }
  }

  pub fn into_learning_provider(self) -> Option<LearningProvider> {
    match self {
      Self::LearningProvider(p) => Some(p),
      Self::ManagementGroup(_) => None,
    }
  }

  pub fn into_management_group(self) -> Option<ManagementGroup> {
    match self {
      Self::ManagementGroup(g) => Some(g),
      Self::LearningProvider(_) => None,
    }
  }
}

// ─── Translation ─────────────────────────────────────────────────────────────

/// The code lists a [`Translator`] knows about.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
pub enum EnumerationName {
  ProviderType,
  ProviderTypeGroup,
  ProviderStatus,
  PhaseOfEducation,
  ManagementGroupStatus,
}

/// Translates a source code value into the public vocabulary.
pub trait Translator: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Returns `None` when the value has no translation.
  fn translate<'a>(
    &'a self,
    enumeration: EnumerationName,
    source_value: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}

// ─── Mapper ──────────────────────────────────────────────────────────────────

/// Converts a source record into its public shape.
///
/// Implementations fail on unsupported `(source, target)` pairs, e.g. asking
/// for a learning provider from a group.
pub trait Mapper: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn map<'a>(
    &'a self,
    source: SourceEntity<'a>,
    target: TargetKind,
  ) -> impl Future<Output = Result<MappedEntity, Self::Error>> + Send + 'a;
}
