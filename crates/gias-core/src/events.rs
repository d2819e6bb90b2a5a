//! Domain events emitted when the current view changes.

use std::future::Future;

use chrono::NaiveDate;

use crate::domain::{LearningProvider, ManagementGroup};

/// Sink for created/updated events. A failed publish is reported as an error
/// and aborts processing of that single item.
pub trait EventPublisher: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn publish_learning_provider_created(
    &self,
    provider: LearningProvider,
    point_in_time: NaiveDate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn publish_learning_provider_updated(
    &self,
    provider: LearningProvider,
    point_in_time: NaiveDate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn publish_management_group_created(
    &self,
    group: ManagementGroup,
    point_in_time: NaiveDate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn publish_management_group_updated(
    &self,
    group: ManagementGroup,
    point_in_time: NaiveDate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
