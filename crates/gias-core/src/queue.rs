//! The processing queue that fans reconciliation work out to batch workers.

use std::future::Future;

use crate::model::{EntityType, StagingBatchQueueItem};

/// At-least-once delivery of [`StagingBatchQueueItem`]s, one logical queue per
/// entity type. No ordering is guaranteed across items.
pub trait ProcessingQueue: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn enqueue_batch(
    &self,
    queue: EntityType,
    item: StagingBatchQueueItem,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
