//! Public shapes published to downstream consumers.
//!
//! A [`LearningProvider`] is the public view of an establishment. A
//! [`ManagementGroup`] is the public view of either a group or a local
//! authority; the two are told apart by the type prefix of the group's code.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, model::Address};

// ─── Management group type ───────────────────────────────────────────────────

/// The closed set of management group kinds, by code prefix.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ManagementGroupType {
  #[serde(rename = "LA")]
  #[strum(serialize = "LA")]
  LocalAuthority,
  #[serde(rename = "FED")]
  #[strum(serialize = "FED")]
  Federation,
  #[serde(rename = "TRUST")]
  #[strum(serialize = "TRUST")]
  Trust,
  #[serde(rename = "SSP")]
  #[strum(serialize = "SSP")]
  SchoolSponsor,
  #[serde(rename = "MAT")]
  #[strum(serialize = "MAT")]
  MultiAcademyTrust,
  #[serde(rename = "SAT")]
  #[strum(serialize = "SAT")]
  SingleAcademyTrust,
}

impl ManagementGroupType {
  /// Resolve the source's numeric group type code. Leading zeros are
  /// ignored (`"06"` and `"6"` are the same type).
  pub fn from_group_type_code(code: &str) -> Option<Self> {
    match code.trim().trim_start_matches('0') {
      "1" => Some(Self::Federation),
      "2" => Some(Self::Trust),
      "5" => Some(Self::SchoolSponsor),
      "6" => Some(Self::MultiAcademyTrust),
      "10" => Some(Self::SingleAcademyTrust),
      _ => None,
    }
  }

  pub fn display_name(self) -> &'static str {
    match self {
      Self::LocalAuthority => "Local Authority",
      Self::Federation => "Federation",
      Self::Trust => "Trust",
      Self::SchoolSponsor => "School sponsor",
      Self::MultiAcademyTrust => "Multi-academy trust",
      Self::SingleAcademyTrust => "Single-academy trust",
    }
  }
}

// ─── Management group code ───────────────────────────────────────────────────

/// A parsed `"{TYPE}-{id}"` management group code, e.g. `LA-202` or
/// `MAT-16720`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagementGroupCode {
  pub group_type: ManagementGroupType,
  pub identifier: i64,
}

impl ManagementGroupCode {
  pub fn new(group_type: ManagementGroupType, identifier: i64) -> Self {
    Self { group_type, identifier }
  }
}

impl fmt::Display for ManagementGroupCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.group_type, self.identifier)
  }
}

impl FromStr for ManagementGroupCode {
  type Err = Error;

  fn from_str(code: &str) -> Result<Self> {
    let invalid = |reason| Error::InvalidManagementGroupCode {
      code: code.to_owned(),
      reason,
    };

    let (prefix, id) =
      code.split_once('-').ok_or_else(|| invalid("expected TYPE-id"))?;
    let group_type = ManagementGroupType::from_str(prefix)
      .map_err(|_| invalid("unknown type prefix"))?;
    let identifier = id
      .parse::<i64>()
      .map_err(|_| invalid("identifier is not an integer"))?;

    Ok(Self { group_type, identifier })
  }
}

// ─── Public shapes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementGroup {
  /// `"{TYPE}-{identifier}"`.
  pub code:                   String,
  pub group_type:             ManagementGroupType,
  pub type_name:              String,
  pub identifier:             String,
  pub name:                   String,
  pub status:                 Option<String>,
  pub companies_house_number: Option<String>,
  pub ukprn:                  Option<i64>,
  pub open_date:              Option<NaiveDate>,
  pub close_date:             Option<NaiveDate>,
  pub address:                Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningProvider {
  pub urn:                         i64,
  pub ukprn:                       Option<i64>,
  pub uprn:                        Option<String>,
  pub name:                        String,
  pub establishment_number:        Option<i64>,
  pub provider_type:               Option<String>,
  pub provider_type_group:         Option<String>,
  pub provider_status:             Option<String>,
  pub phase_of_education:          Option<String>,
  pub open_date:                   Option<NaiveDate>,
  pub close_date:                  Option<NaiveDate>,
  pub statutory_low_age:           Option<u8>,
  pub statutory_high_age:          Option<u8>,
  pub local_authority_code:        Option<i64>,
  pub companies_house_number:      Option<String>,
  pub charities_commission_number: Option<String>,
  pub address:                     Address,
  pub website:                     Option<String>,
  pub telephone:                   Option<String>,
  /// The trust/group this provider belongs to, or its local authority.
  pub management_group:            Option<ManagementGroup>,
}
