//! The upstream source of establishment and group data.

use std::future::Future;

use crate::model::{Establishment, Group};

/// Full-dataset pull plus single-item lookup. A missing item is `Ok(None)`,
/// not an error.
pub trait SourceClient: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn download_establishments(
    &self,
  ) -> impl Future<Output = Result<Vec<Establishment>, Self::Error>> + Send + '_;

  fn download_groups(
    &self,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  fn get_establishment(
    &self,
    urn: i64,
  ) -> impl Future<Output = Result<Option<Establishment>, Self::Error>> + Send + '_;

  fn get_group(
    &self,
    uid: i64,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;
}
