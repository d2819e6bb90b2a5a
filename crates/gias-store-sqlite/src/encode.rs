//! Conversions between domain values and their SQLite column forms.
//!
//! Days are stored as `YYYY-MM-DD`, timestamps as RFC 3339 and entity types
//! by their snake_case name, so rows stay readable from the sqlite3 shell.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use gias_core::model::EntityType;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ─── Dates ────────────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String { date.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── EntityType ───────────────────────────────────────────────────────────────

pub fn encode_entity_type(t: EntityType) -> &'static str {
  match t {
    EntityType::Establishment => "establishment",
    EntityType::Group => "group",
    EntityType::LocalAuthority => "local_authority",
  }
}

pub fn decode_entity_type(s: &str) -> Result<EntityType> {
  EntityType::from_str(s).map_err(|_| Error::UnknownValue {
    what:  "entity type",
    value: s.to_owned(),
  })
}

// ─── JSON payloads ────────────────────────────────────────────────────────────

pub fn decode_payload<T: DeserializeOwned>(s: &str) -> Result<T> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ────────────────────────────────────────────────────────────────

/// Raw strings read from a `staging` or `current` row.
pub struct RawRow {
  pub point_in_time: String,
  pub payload:       String,
}
