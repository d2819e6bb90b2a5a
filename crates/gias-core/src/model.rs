//! Source records and their staging envelopes.
//!
//! [`Establishment`], [`Group`] and [`LocalAuthority`] are snapshots exactly
//! as the source publishes them. [`PointInTime`] wraps one of them with the
//! day it was staged; the same envelope is used for the single "current" row
//! kept per entity id.

use std::ops::Deref;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use strum::{AsRefStr, Display, EnumString};

use crate::mapping::{SourceEntity, TargetKind};

// ─── Entity type ─────────────────────────────────────────────────────────────

/// The three kinds of record the cache tracks. The string form is used as the
/// storage partition key and as the queue name.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
  Establishment,
  Group,
  LocalAuthority,
}

impl EntityType {
  pub const ALL: [EntityType; 3] =
    [Self::Establishment, Self::Group, Self::LocalAuthority];
}

// ─── Shared value types ──────────────────────────────────────────────────────

/// A lookup value as published by the source: a code plus its display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeNamePair {
  pub code: String,
  pub name: Option<String>,
}

impl CodeNamePair {
  pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
    Self { code: code.into(), name: Some(name.into()) }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
  pub street:   Option<String>,
  pub locality: Option<String>,
  pub address3: Option<String>,
  pub town:     Option<String>,
  pub county:   Option<String>,
  pub postcode: Option<String>,
}

// ─── Source records ──────────────────────────────────────────────────────────

/// An educational establishment, identified by its URN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Establishment {
  pub urn:                         i64,
  pub ukprn:                       Option<i64>,
  pub uprn:                        Option<String>,
  pub name:                        String,
  pub establishment_number:        Option<i64>,
  pub establishment_type:          Option<CodeNamePair>,
  pub establishment_type_group:    Option<CodeNamePair>,
  pub establishment_status:        Option<CodeNamePair>,
  pub phase_of_education:          Option<CodeNamePair>,
  pub open_date:                   Option<NaiveDate>,
  pub close_date:                  Option<NaiveDate>,
  pub statutory_low_age:           Option<u8>,
  pub statutory_high_age:          Option<u8>,
  pub local_authority_code:        Option<i64>,
  pub local_authority_name:        Option<String>,
  /// UID of the trust or other group this establishment belongs to.
  pub trust_uid:                   Option<i64>,
  pub companies_house_number:      Option<String>,
  pub charities_commission_number: Option<String>,
  pub address:                     Address,
  pub website:                     Option<String>,
  pub telephone:                   Option<String>,
  /// Source-side bookkeeping; never exposed in the public shape.
  pub last_changed_date:           Option<NaiveDate>,
}

/// A grouping of establishments (trust, federation, sponsor), identified by
/// its UID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
  pub uid:                    i64,
  /// The source's own reference, e.g. `TR00024`.
  pub group_id:               Option<String>,
  pub name:                   String,
  pub group_type:             Option<CodeNamePair>,
  pub status:                 Option<CodeNamePair>,
  pub open_date:              Option<NaiveDate>,
  pub closed_date:            Option<NaiveDate>,
  pub companies_house_number: Option<String>,
  pub ukprn:                  Option<i64>,
  pub address:                Address,
}

/// A local authority. Not downloaded directly; derived from the LA code and
/// name carried by each establishment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAuthority {
  pub code: i64,
  pub name: String,
}

// ─── Entity trait ────────────────────────────────────────────────────────────

/// Behaviour shared by every record kind the pipeline stages and diffs.
pub trait Entity:
  Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
  const ENTITY_TYPE: EntityType;
  /// The public shape this record maps to.
  const TARGET: TargetKind;

  fn id(&self) -> i64;

  fn as_source(&self) -> SourceEntity<'_>;

  /// UID of the group whose management group this record is linked to.
  fn parent_group_uid(&self) -> Option<i64> { None }
}

impl Entity for Establishment {
  const ENTITY_TYPE: EntityType = EntityType::Establishment;
  const TARGET: TargetKind = TargetKind::LearningProvider;

  fn id(&self) -> i64 { self.urn }

  fn as_source(&self) -> SourceEntity<'_> { SourceEntity::Establishment(self) }

  fn parent_group_uid(&self) -> Option<i64> { self.trust_uid }
}

impl Entity for Group {
  const ENTITY_TYPE: EntityType = EntityType::Group;
  const TARGET: TargetKind = TargetKind::ManagementGroup;

  fn id(&self) -> i64 { self.uid }

  fn as_source(&self) -> SourceEntity<'_> { SourceEntity::Group(self) }
}

impl Entity for LocalAuthority {
  const ENTITY_TYPE: EntityType = EntityType::LocalAuthority;
  const TARGET: TargetKind = TargetKind::ManagementGroup;

  fn id(&self) -> i64 { self.code }

  fn as_source(&self) -> SourceEntity<'_> { SourceEntity::LocalAuthority(self) }
}

// ─── Staging envelope ────────────────────────────────────────────────────────

/// A record stamped with the day it was staged.
///
/// Staging holds one of these per `(id, point_in_time)`; the current
/// partition holds exactly one per id. `is_current` is bookkeeping only and
/// never takes part in change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointInTime<T> {
  pub entity:        T,
  pub point_in_time: NaiveDate,
  pub is_current:    bool,
}

impl<T> PointInTime<T> {
  pub fn staged(entity: T, point_in_time: NaiveDate) -> Self {
    Self { entity, point_in_time, is_current: false }
  }

  /// The same snapshot, flagged as the row for the current partition.
  pub fn into_current(self) -> Self { Self { is_current: true, ..self } }

  pub fn into_inner(self) -> T { self.entity }
}

impl<T> Deref for PointInTime<T> {
  type Target = T;

  fn deref(&self) -> &T { &self.entity }
}

// ─── Queue item ──────────────────────────────────────────────────────────────

/// A unit of reconciliation work.
///
/// With no parent, `identifiers` are ids of the queue's own entity type. With
/// a parent (group UID or LA code), `identifiers` are the URNs of member
/// establishments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingBatchQueueItem {
  pub parent_identifier: Option<i64>,
  pub identifiers:       Vec<i64>,
  pub point_in_time:     NaiveDate,
}
