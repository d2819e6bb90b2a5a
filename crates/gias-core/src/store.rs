//! Repository traits for staged, current and bookkeeping state.
//!
//! Implemented by storage backends (e.g. `gias-store-sqlite`). The cache
//! manager depends on these abstractions only.

use std::future::Future;

use chrono::NaiveDate;

use crate::model::{Entity, EntityType, PointInTime};

/// Staging and current partitions for one entity type.
///
/// Staged rows are keyed by `(id, point_in_time)`, current rows by `id`. All
/// writes are upserts, so replaying a write leaves the same stored value.
pub trait EntityRepository<T: Entity>: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Upsert a whole snapshot into staging. Backends batch internally.
  fn store_in_staging(
    &self,
    items: Vec<PointInTime<T>>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Upsert the current row for `item`'s id.
  fn store(
    &self,
    item: PointInTime<T>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Read the current row. Returns `None` if the id has never been promoted.
  fn get(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<PointInTime<T>>, Self::Error>> + Send + '_;

  fn get_from_staging(
    &self,
    id: i64,
    point_in_time: NaiveDate,
  ) -> impl Future<Output = Result<Option<PointInTime<T>>, Self::Error>> + Send + '_;

  /// Delete every staged row for `point_in_time`, returning the row count.
  fn clear_staging_for_date(
    &self,
    point_in_time: NaiveDate,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

/// Per-entity-type bookkeeping for the staging tidy-up.
pub trait StateRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The last staging day that was purged, or `None` if never set.
  fn get_last_staging_date_cleared(
    &self,
    entity_type: EntityType,
  ) -> impl Future<Output = Result<Option<NaiveDate>, Self::Error>> + Send + '_;

  fn set_last_staging_date_cleared(
    &self,
    entity_type: EntityType,
    date: NaiveDate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
