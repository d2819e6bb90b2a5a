//! [`CacheManager`]: orchestration of the staging → diff → promote → notify
//! pipeline.
//!
//! | Operation | Module |
//! |-----------|--------|
//! | full and establishment-only downloads | [`download`] |
//! | batch and parent-scoped reconciliation | [`reconcile`] |
//! | staging tidy-up | [`tidy`] |

pub mod download;
pub mod reconcile;
pub mod tidy;

use std::sync::Arc;

use chrono::NaiveDate;
use gias_core::{
  clock::Clock,
  domain::{LearningProvider, ManagementGroup},
  events::EventPublisher,
  mapping::{MappedEntity, Mapper},
  model::{Entity, Establishment, Group, LocalAuthority, PointInTime},
  queue::ProcessingQueue,
  source::SourceClient,
  store::{EntityRepository, StateRepository},
};
use tokio_util::sync::CancellationToken;

use crate::{
  CacheSettings, Error, Result,
  cancel::guard,
  diff::Change,
};

pub use download::DownloadSummary;
pub use reconcile::{BatchSummary, ItemSummary, ParentSummary};
pub use tidy::TidySummary;

// ─── Store bound ──────────────────────────────────────────────────────────────

/// Everything the cache manager needs from its backing store.
pub trait CacheStore:
  EntityRepository<Establishment>
  + EntityRepository<Group>
  + EntityRepository<LocalAuthority>
  + StateRepository
{
}

impl<S> CacheStore for S where
  S: EntityRepository<Establishment>
    + EntityRepository<Group>
    + EntityRepository<LocalAuthority>
    + StateRepository
{
}

// ─── Manager ──────────────────────────────────────────────────────────────────

/// The core of the cache. Holds its collaborators explicitly; nothing is
/// looked up from ambient state.
pub struct CacheManager<Src, St, Q, P, M> {
  source:    Src,
  store:     St,
  queue:     Q,
  publisher: P,
  mapper:    M,
  clock:     Arc<dyn Clock>,
  settings:  CacheSettings,
}

impl<Src, St, Q, P, M> CacheManager<Src, St, Q, P, M>
where
  Src: SourceClient,
  St: CacheStore,
  Q: ProcessingQueue,
  P: EventPublisher,
  M: Mapper,
{
  pub fn new(
    source: Src,
    store: St,
    queue: Q,
    publisher: P,
    mapper: M,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
  ) -> Result<Self> {
    settings.validate()?;
    Ok(Self { source, store, queue, publisher, mapper, clock, settings })
  }

  pub fn settings(&self) -> &CacheSettings { &self.settings }

  // ── Repository access ─────────────────────────────────────────────────────

  async fn current<T: Entity>(
    &self,
    id: i64,
    cancel: &CancellationToken,
  ) -> Result<Option<PointInTime<T>>>
  where
    St: EntityRepository<T>,
  {
    guard(cancel, EntityRepository::<T>::get(&self.store, id), Error::Store).await
  }

  async fn staged<T: Entity>(
    &self,
    id: i64,
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<Option<PointInTime<T>>>
  where
    St: EntityRepository<T>,
  {
    guard(
      cancel,
      EntityRepository::<T>::get_from_staging(&self.store, id, point_in_time),
      Error::Store,
    )
    .await
  }

  /// Load the staged and current rows for `id`. A missing staged row is an
  /// error for this id.
  async fn load<T: Entity>(
    &self,
    id: i64,
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<(PointInTime<T>, Option<PointInTime<T>>)>
  where
    St: EntityRepository<T>,
  {
    let current = self.current::<T>(id, cancel).await?;
    let staging = self
      .staged::<T>(id, point_in_time, cancel)
      .await?
      .ok_or(Error::MissingStaging {
        entity_type: T::ENTITY_TYPE,
        id,
        point_in_time,
      })?;
    Ok((staging, current))
  }

  // ── Promote & publish ─────────────────────────────────────────────────────

  /// Overwrite the current row with `staging` and publish `mapped` as the
  /// event for `change`. The event carries the staged row's own point in
  /// time.
  async fn commit<T: Entity>(
    &self,
    change: Change,
    staging: PointInTime<T>,
    mapped: MappedEntity,
    cancel: &CancellationToken,
  ) -> Result<()>
  where
    St: EntityRepository<T>,
  {
    let point_in_time = staging.point_in_time;
    guard(
      cancel,
      EntityRepository::<T>::store(&self.store, staging.into_current()),
      Error::Store,
    )
    .await?;
    self.publish(change, mapped, point_in_time, cancel).await
  }

  async fn publish(
    &self,
    change: Change,
    mapped: MappedEntity,
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<()> {
    match (change, mapped) {
      (Change::Unchanged, _) => Ok(()),
      (Change::Created, MappedEntity::LearningProvider(p)) => {
        self.publish_provider(true, p, point_in_time, cancel).await
      }
      (Change::Updated, MappedEntity::LearningProvider(p)) => {
        self.publish_provider(false, p, point_in_time, cancel).await
      }
      (Change::Created, MappedEntity::ManagementGroup(g)) => {
        self.publish_group(true, g, point_in_time, cancel).await
      }
      (Change::Updated, MappedEntity::ManagementGroup(g)) => {
        self.publish_group(false, g, point_in_time, cancel).await
      }
    }
  }

  async fn publish_provider(
    &self,
    created: bool,
    provider: LearningProvider,
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<()> {
    if created {
      guard(
        cancel,
        self.publisher.publish_learning_provider_created(provider, point_in_time),
        Error::Publish,
      )
      .await
    } else {
      guard(
        cancel,
        self.publisher.publish_learning_provider_updated(provider, point_in_time),
        Error::Publish,
      )
      .await
    }
  }

  async fn publish_group(
    &self,
    created: bool,
    group: ManagementGroup,
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<()> {
    if created {
      guard(
        cancel,
        self.publisher.publish_management_group_created(group, point_in_time),
        Error::Publish,
      )
      .await
    } else {
      guard(
        cancel,
        self.publisher.publish_management_group_updated(group, point_in_time),
        Error::Publish,
      )
      .await
    }
  }
}
