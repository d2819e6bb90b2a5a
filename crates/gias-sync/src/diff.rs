//! Change detection between a staged snapshot and the current one.
//!
//! Only fields that reach the public shape are compared. Source bookkeeping
//! (`last_changed_date`, the source's own group reference, code display
//! names that are re-derived through translation) and the staging envelope
//! itself never cause a change.

use gias_core::model::{
  CodeNamePair, Entity, Establishment, Group, LocalAuthority,
};

/// How a staged snapshot relates to the current row for the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
  /// No current row exists.
  Created,
  /// The current row differs in a published field.
  Updated,
  Unchanged,
}

impl Change {
  pub fn is_change(self) -> bool { !matches!(self, Self::Unchanged) }
}

/// Narrow equality: true when `self` and `other` would publish differently.
pub trait MaterialDiff: Entity {
  fn differs_from(&self, other: &Self) -> bool;
}

/// Classify `staging` against `current`.
pub fn classify<T: MaterialDiff>(current: Option<&T>, staging: &T) -> Change {
  match current {
    None => Change::Created,
    Some(current) if staging.differs_from(current) => Change::Updated,
    Some(_) => Change::Unchanged,
  }
}

// ─── Per-entity rules ─────────────────────────────────────────────────────────

impl MaterialDiff for Establishment {
  fn differs_from(&self, other: &Self) -> bool {
    self.urn != other.urn
      || self.ukprn != other.ukprn
      || self.uprn != other.uprn
      || self.name != other.name
      || self.establishment_number != other.establishment_number
      || code(&self.establishment_type) != code(&other.establishment_type)
      || code(&self.establishment_type_group)
        != code(&other.establishment_type_group)
      || code(&self.establishment_status) != code(&other.establishment_status)
      || code(&self.phase_of_education) != code(&other.phase_of_education)
      || self.open_date != other.open_date
      || self.close_date != other.close_date
      || self.statutory_low_age != other.statutory_low_age
      || self.statutory_high_age != other.statutory_high_age
      || self.local_authority_code != other.local_authority_code
      // The LA name is published as the linked management group's name, but
      // trust members link to their trust instead.
      || (self.trust_uid.is_none()
        && self.local_authority_name != other.local_authority_name)
      || self.trust_uid != other.trust_uid
      || self.companies_house_number != other.companies_house_number
      || self.charities_commission_number != other.charities_commission_number
      || self.address != other.address
      || self.website != other.website
      || self.telephone != other.telephone
  }
}

impl MaterialDiff for Group {
  fn differs_from(&self, other: &Self) -> bool {
    self.uid != other.uid
      || self.name != other.name
      || code(&self.group_type) != code(&other.group_type)
      || code(&self.status) != code(&other.status)
      || self.open_date != other.open_date
      || self.closed_date != other.closed_date
      || self.companies_house_number != other.companies_house_number
      || self.ukprn != other.ukprn
      || self.address != other.address
  }
}

impl MaterialDiff for LocalAuthority {
  fn differs_from(&self, other: &Self) -> bool {
    self.code != other.code || self.name != other.name
  }
}

fn code(pair: &Option<CodeNamePair>) -> Option<&str> {
  pair.as_ref().map(|p| p.code.as_str())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
