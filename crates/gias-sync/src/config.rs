//! Settings for the cache manager.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tunables for staging retention and queue fan-out. Every field has a
/// default, so a partial config section is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
  /// Staged days older than this are purged by the tidy-up.
  pub number_of_days_to_retain_staging_data: u32,
  /// Ids per queue item for the full download.
  pub batch_size:                            usize,
  /// Ids per queue item for the establishment-only download.
  pub establishment_batch_size:              usize,
  /// Watermark assumed when an entity type has never been tidied.
  pub staging_epoch:                         NaiveDate,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      number_of_days_to_retain_staging_data: 14,
      batch_size:                            100,
      establishment_batch_size:              1000,
      staging_epoch:                         NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap_or(NaiveDate::MIN),
    }
  }
}

impl CacheSettings {
  pub fn validate(&self) -> Result<()> {
    if self.batch_size == 0 {
      return Err(Error::InvalidSettings("batch_size must be at least 1"));
    }
    if self.establishment_batch_size == 0 {
      return Err(Error::InvalidSettings(
        "establishment_batch_size must be at least 1",
      ));
    }
    Ok(())
  }
}
