//! Batch and parent-scoped reconciliation of staged rows against current.
//!
//! Ids in a batch are processed strictly in order. A failure for one id is
//! logged and counted and the batch moves on; only cancellation aborts it.
//! Redelivered batches are safe to replay: staged rows are unchanged and
//! already-promoted rows classify as unchanged.

use std::collections::HashMap;

use chrono::NaiveDate;
use gias_core::{
  domain::ManagementGroup,
  events::EventPublisher,
  mapping::{MappedEntity, Mapper},
  model::{EntityType, Establishment, Group, LocalAuthority, StagingBatchQueueItem},
  queue::ProcessingQueue,
  source::SourceClient,
  store::EntityRepository,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CacheManager, CacheStore};
use crate::{
  Error, Result,
  cancel::check,
  diff::{Change, MaterialDiff, classify},
  mapping::{map_entity, map_learning_provider, map_management_group},
};

// ─── Summaries ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
  pub created:   usize,
  pub updated:   usize,
  pub unchanged: usize,
  pub failed:    usize,
}

impl BatchSummary {
  fn record(&mut self, change: Change) {
    match change {
      Change::Created => self.created += 1,
      Change::Updated => self.updated += 1,
      Change::Unchanged => self.unchanged += 1,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentSummary {
  pub parent:   Change,
  /// Whether members were forced to update because the parent changed.
  pub cascaded: bool,
  /// The parent has no public shape, so neither it nor its members were
  /// touched. Members are still reconciled by the plain establishment batches.
  pub skipped:  bool,
  pub members:  BatchSummary,
}

/// The result of [`CacheManager::process_queue_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSummary {
  Batch(BatchSummary),
  Parent(ParentSummary),
}

/// Management groups already resolved while processing one batch, by UID.
type LinkCache = HashMap<i64, Option<ManagementGroup>>;

impl<Src, St, Q, P, M> CacheManager<Src, St, Q, P, M>
where
  Src: SourceClient,
  St: CacheStore,
  Q: ProcessingQueue,
  P: EventPublisher,
  M: Mapper,
{
  // ── Queue dispatch ────────────────────────────────────────────────────────

  /// Route a delivered queue item to the matching operation.
  pub async fn process_queue_item(
    &self,
    queue: EntityType,
    item: &StagingBatchQueueItem,
    cancel: &CancellationToken,
  ) -> Result<ItemSummary> {
    let point_in_time = Some(item.point_in_time);
    let ids = &item.identifiers;
    match (queue, item.parent_identifier) {
      (EntityType::Establishment, _) => self
        .process_batch_of_establishments(ids, point_in_time, cancel)
        .await
        .map(ItemSummary::Batch),
      (EntityType::Group, None) => self
        .process_batch_of_groups(ids, point_in_time, cancel)
        .await
        .map(ItemSummary::Batch),
      (EntityType::Group, Some(uid)) => self
        .process_group(uid, ids, item.point_in_time, cancel)
        .await
        .map(ItemSummary::Parent),
      (EntityType::LocalAuthority, None) => self
        .process_batch_of_local_authorities(ids, point_in_time, cancel)
        .await
        .map(ItemSummary::Batch),
      (EntityType::LocalAuthority, Some(code)) => self
        .process_local_authority(code, ids, item.point_in_time, cancel)
        .await
        .map(ItemSummary::Parent),
    }
  }

  // ── Batches without a parent ──────────────────────────────────────────────

  /// Reconcile establishments staged at `point_in_time` (today when `None`).
  pub async fn process_batch_of_establishments(
    &self,
    urns: &[i64],
    point_in_time: Option<NaiveDate>,
    cancel: &CancellationToken,
  ) -> Result<BatchSummary> {
    self.process_batch::<Establishment>(urns, point_in_time, cancel).await
  }

  pub async fn process_batch_of_groups(
    &self,
    uids: &[i64],
    point_in_time: Option<NaiveDate>,
    cancel: &CancellationToken,
  ) -> Result<BatchSummary> {
    self.process_batch::<Group>(uids, point_in_time, cancel).await
  }

  pub async fn process_batch_of_local_authorities(
    &self,
    codes: &[i64],
    point_in_time: Option<NaiveDate>,
    cancel: &CancellationToken,
  ) -> Result<BatchSummary> {
    self.process_batch::<LocalAuthority>(codes, point_in_time, cancel).await
  }

  async fn process_batch<T: MaterialDiff>(
    &self,
    ids: &[i64],
    point_in_time: Option<NaiveDate>,
    cancel: &CancellationToken,
  ) -> Result<BatchSummary>
  where
    St: EntityRepository<T>,
  {
    let point_in_time = point_in_time.unwrap_or_else(|| self.clock.today());
    let mut summary = BatchSummary::default();
    let mut links = LinkCache::new();

    for &id in ids {
      check(cancel)?;
      match self.reconcile::<T>(id, point_in_time, &mut links, cancel).await {
        Ok(change) => summary.record(change),
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(e) => {
          summary.failed += 1;
          warn!(
            entity_type = %T::ENTITY_TYPE, id, %point_in_time, error = %e,
            "failed to reconcile"
          );
        }
      }
    }

    info!(entity_type = %T::ENTITY_TYPE, %point_in_time, ?summary, "batch processed");
    Ok(summary)
  }

  async fn reconcile<T: MaterialDiff>(
    &self,
    id: i64,
    point_in_time: NaiveDate,
    links: &mut LinkCache,
    cancel: &CancellationToken,
  ) -> Result<Change>
  where
    St: EntityRepository<T>,
  {
    let (staging, current) = self.load::<T>(id, point_in_time, cancel).await?;
    let change = classify(current.as_deref(), &staging.entity);
    debug!(entity_type = %T::ENTITY_TYPE, id, ?change, "classified");
    if !change.is_change() {
      return Ok(change);
    }

    let mut mapped = map_entity(&self.mapper, &staging.entity).await?;
    if let (Some(uid), MappedEntity::LearningProvider(provider)) =
      (staging.entity.parent_group_uid(), &mut mapped)
    {
      if let Some(link) = self.group_link(uid, point_in_time, links, cancel).await? {
        provider.management_group = Some(link);
      }
    }
    self.commit(change, staging, mapped, cancel).await?;
    Ok(change)
  }

  /// Resolve the management group for a group UID, preferring the snapshot
  /// staged in the same run. Unresolvable groups fall back to the
  /// establishment's default link.
  async fn group_link(
    &self,
    uid: i64,
    point_in_time: NaiveDate,
    links: &mut LinkCache,
    cancel: &CancellationToken,
  ) -> Result<Option<ManagementGroup>> {
    if let Some(link) = links.get(&uid) {
      return Ok(link.clone());
    }

    let group = match self.staged::<Group>(uid, point_in_time, cancel).await? {
      Some(staged) => Some(staged),
      None => self.current::<Group>(uid, cancel).await?,
    };
    let link = match group {
      Some(group) => match map_management_group(&self.mapper, &group.entity).await {
        Ok(link) => Some(link),
        Err(e) => {
          warn!(uid, error = %e, "cannot map linked group, using default link");
          None
        }
      },
      None => {
        debug!(uid, "linked group not found, using default link");
        None
      }
    };

    links.insert(uid, link.clone());
    Ok(link)
  }

  // ── Parent-scoped batches ─────────────────────────────────────────────────

  /// Reconcile a group and the member establishments queued with it.
  pub async fn process_group(
    &self,
    uid: i64,
    member_urns: &[i64],
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<ParentSummary> {
    self.process_parent::<Group>(uid, member_urns, point_in_time, cancel).await
  }

  /// Reconcile a local authority and the member establishments queued with
  /// it.
  pub async fn process_local_authority(
    &self,
    la_code: i64,
    member_urns: &[i64],
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<ParentSummary> {
    self
      .process_parent::<LocalAuthority>(la_code, member_urns, point_in_time, cancel)
      .await
  }

  /// The parent is reconciled first. If it was created or updated, every
  /// member is published as updated even when its own fields are unchanged,
  /// because the member's management-group link comes from the parent.
  ///
  /// A parent whose current row already carries `point_in_time` was promoted
  /// by an earlier item of this run (its members can span several items, and
  /// items can be redelivered), so it still cascades. Members promoted at
  /// `point_in_time` already are never published twice.
  async fn process_parent<T: MaterialDiff>(
    &self,
    parent_id: i64,
    member_urns: &[i64],
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<ParentSummary>
  where
    St: EntityRepository<T>,
  {
    let (staging, current) = self.load::<T>(parent_id, point_in_time, cancel).await?;
    let promoted_this_run = current
      .as_ref()
      .is_some_and(|c| c.point_in_time == point_in_time);
    let parent = classify(current.as_deref(), &staging.entity);
    let link = match map_management_group(&self.mapper, &staging.entity).await {
      Ok(link) => link,
      Err(Error::Mapping(e)) => {
        warn!(
          entity_type = %T::ENTITY_TYPE, parent_id, %point_in_time, error = %e,
          "parent cannot be mapped, skipping item"
        );
        return Ok(ParentSummary {
          parent:   Change::Unchanged,
          cascaded: false,
          skipped:  true,
          members:  BatchSummary::default(),
        });
      }
      Err(e) => return Err(e),
    };

    if parent.is_change() {
      let mapped = MappedEntity::ManagementGroup(link.clone());
      self.commit(parent, staging, mapped, cancel).await?;
    }

    let cascaded = parent.is_change() || promoted_this_run;
    let mut members = BatchSummary::default();
    for &urn in member_urns {
      check(cancel)?;
      match self.reconcile_member(urn, point_in_time, cascaded, &link, cancel).await {
        Ok(change) => members.record(change),
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(e) => {
          members.failed += 1;
          warn!(
            entity_type = %T::ENTITY_TYPE, parent_id, urn, %point_in_time, error = %e,
            "failed to reconcile member"
          );
        }
      }
    }

    let summary = ParentSummary { parent, cascaded, skipped: false, members };
    info!(
      entity_type = %T::ENTITY_TYPE, parent_id, %point_in_time, ?summary,
      "parent processed"
    );
    Ok(summary)
  }

  async fn reconcile_member(
    &self,
    urn: i64,
    point_in_time: NaiveDate,
    cascade: bool,
    link: &ManagementGroup,
    cancel: &CancellationToken,
  ) -> Result<Change> {
    let (staging, current) =
      self.load::<Establishment>(urn, point_in_time, cancel).await?;
    let behind = current
      .as_ref()
      .is_some_and(|c| c.point_in_time < point_in_time);
    let change = match classify(current.as_deref(), &staging.entity) {
      Change::Unchanged if cascade && behind => Change::Updated,
      change => change,
    };
    if !change.is_change() {
      return Ok(change);
    }

    let provider =
      map_learning_provider(&self.mapper, &staging.entity, Some(link)).await?;
    self
      .commit(change, staging, MappedEntity::LearningProvider(provider), cancel)
      .await?;
    Ok(change)
  }
}
