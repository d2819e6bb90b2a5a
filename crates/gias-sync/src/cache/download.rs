//! Bulk download, staging and queue fan-out.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use gias_core::{
  events::EventPublisher,
  mapping::Mapper,
  model::{
    Entity, EntityType, Establishment, LocalAuthority, PointInTime,
    StagingBatchQueueItem,
  },
  queue::ProcessingQueue,
  source::SourceClient,
  store::EntityRepository,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{CacheManager, CacheStore};
use crate::{Error, Result, cancel::guard};

/// What a download run staged and enqueued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
  pub point_in_time:            Option<NaiveDate>,
  pub establishments:           usize,
  pub groups:                   usize,
  pub local_authorities:        usize,
  pub establishment_batches:    usize,
  pub group_batches:            usize,
  pub local_authority_batches:  usize,
}

impl<Src, St, Q, P, M> CacheManager<Src, St, Q, P, M>
where
  Src: SourceClient,
  St: CacheStore,
  Q: ProcessingQueue,
  P: EventPublisher,
  M: Mapper,
{
  /// Download establishments and groups, stage them together with the local
  /// authorities they reference, and enqueue reconciliation work.
  ///
  /// Nothing in the current partition is touched; a failed run can simply be
  /// repeated.
  pub async fn download_all_gias_data_to_cache(
    &self,
    cancel: &CancellationToken,
  ) -> Result<DownloadSummary> {
    let point_in_time = self.clock.today();
    let batch_size = self.settings.batch_size;
    info!(%point_in_time, "downloading establishments and groups");

    let (establishments, groups) = tokio::try_join!(
      guard(cancel, self.source.download_establishments(), Error::Source),
      guard(cancel, self.source.download_groups(), Error::Source),
    )?;
    let local_authorities = derive_local_authorities(&establishments);
    info!(
      establishments = establishments.len(),
      groups = groups.len(),
      local_authorities = local_authorities.len(),
      "download complete"
    );

    let urns: Vec<i64> = establishments.iter().map(|e| e.urn).collect();
    let uids: Vec<i64> = groups.iter().map(|g| g.uid).collect();
    let la_codes: Vec<i64> = local_authorities.iter().map(|la| la.code).collect();
    let members = Membership::of(&establishments, &uids);

    let mut summary = DownloadSummary {
      point_in_time: Some(point_in_time),
      establishments: establishments.len(),
      groups: groups.len(),
      local_authorities: local_authorities.len(),
      ..Default::default()
    };

    self.stage(establishments, point_in_time, cancel).await?;
    self.stage(groups, point_in_time, cancel).await?;
    self.stage(local_authorities, point_in_time, cancel).await?;

    summary.establishment_batches = self
      .enqueue(EntityType::Establishment, None, &urns, batch_size, point_in_time, cancel)
      .await?;
    for uid in uids {
      summary.group_batches += self
        .enqueue(
          EntityType::Group,
          Some(uid),
          members.of_group(uid),
          batch_size,
          point_in_time,
          cancel,
        )
        .await?;
    }
    for code in la_codes {
      summary.local_authority_batches += self
        .enqueue(
          EntityType::LocalAuthority,
          Some(code),
          members.of_local_authority(code),
          batch_size,
          point_in_time,
          cancel,
        )
        .await?;
    }

    info!(?summary, "staged and enqueued");
    Ok(summary)
  }

  /// Establishment-only variant of
  /// [`download_all_gias_data_to_cache`](Self::download_all_gias_data_to_cache),
  /// enqueueing URNs in batches of `establishment_batch_size`.
  pub async fn download_establishments_to_cache(
    &self,
    cancel: &CancellationToken,
  ) -> Result<DownloadSummary> {
    let point_in_time = self.clock.today();
    info!(%point_in_time, "downloading establishments");

    let establishments =
      guard(cancel, self.source.download_establishments(), Error::Source).await?;
    let urns: Vec<i64> = establishments.iter().map(|e| e.urn).collect();
    let mut summary = DownloadSummary {
      point_in_time: Some(point_in_time),
      establishments: establishments.len(),
      ..Default::default()
    };

    self.stage(establishments, point_in_time, cancel).await?;
    summary.establishment_batches = self
      .enqueue(
        EntityType::Establishment,
        None,
        &urns,
        self.settings.establishment_batch_size,
        point_in_time,
        cancel,
      )
      .await?;

    info!(?summary, "staged and enqueued");
    Ok(summary)
  }

  async fn stage<T: Entity>(
    &self,
    items: Vec<T>,
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<()>
  where
    St: EntityRepository<T>,
  {
    let count = items.len();
    let staged = items
      .into_iter()
      .map(|item| PointInTime::staged(item, point_in_time))
      .collect();
    guard(
      cancel,
      EntityRepository::<T>::store_in_staging(&self.store, staged),
      Error::Store,
    )
    .await?;
    tracing::debug!(entity_type = %T::ENTITY_TYPE, count, "staged");
    Ok(())
  }

  /// Enqueue `ids` in order, `batch_size` at a time. A parent with no members
  /// still gets one (empty) item so the parent itself is reconciled.
  async fn enqueue(
    &self,
    queue: EntityType,
    parent_identifier: Option<i64>,
    ids: &[i64],
    batch_size: usize,
    point_in_time: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<usize> {
    let mut batches = partition(ids, batch_size);
    if batches.is_empty() && parent_identifier.is_some() {
      batches.push(Vec::new());
    }

    let count = batches.len();
    for identifiers in batches {
      let item = StagingBatchQueueItem {
        parent_identifier,
        identifiers,
        point_in_time,
      };
      guard(cancel, self.queue.enqueue_batch(queue, item), Error::Queue).await?;
    }
    Ok(count)
  }
}

// ─── Pure helpers ─────────────────────────────────────────────────────────────

/// Split `ids` into consecutive batches of `batch_size`, the last possibly
/// shorter.
pub fn partition(ids: &[i64], batch_size: usize) -> Vec<Vec<i64>> {
  ids.chunks(batch_size.max(1)).map(<[i64]>::to_vec).collect()
}

/// The distinct local authorities referenced by `establishments`, in
/// first-seen order. The first name seen for a code wins.
pub fn derive_local_authorities(establishments: &[Establishment]) -> Vec<LocalAuthority> {
  let mut seen = HashSet::new();
  establishments
    .iter()
    .filter_map(|e| {
      let code = e.local_authority_code?;
      seen.insert(code).then(|| LocalAuthority {
        code,
        name: e.local_authority_name.clone().unwrap_or_default(),
      })
    })
    .collect()
}

/// Member URNs per parent, in source order.
///
/// An establishment whose trust is in the downloaded group set belongs to
/// that group only, since its management-group link comes from the group.
/// Every other establishment belongs to its local authority.
struct Membership {
  groups:            HashMap<i64, Vec<i64>>,
  local_authorities: HashMap<i64, Vec<i64>>,
}

impl Membership {
  fn of(establishments: &[Establishment], uids: &[i64]) -> Self {
    let known: HashSet<i64> = uids.iter().copied().collect();
    let mut groups: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut local_authorities: HashMap<i64, Vec<i64>> = HashMap::new();

    for e in establishments {
      match e.trust_uid.filter(|uid| known.contains(uid)) {
        Some(uid) => groups.entry(uid).or_default().push(e.urn),
        None => {
          if let Some(code) = e.local_authority_code {
            local_authorities.entry(code).or_default().push(e.urn);
          }
        }
      }
    }

    Self { groups, local_authorities }
  }

  fn of_group(&self, uid: i64) -> &[i64] {
    self.groups.get(&uid).map(Vec::as_slice).unwrap_or_default()
  }

  fn of_local_authority(&self, code: i64) -> &[i64] {
    self
      .local_authorities
      .get(&code)
      .map(Vec::as_slice)
      .unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partition_keeps_order_and_remainder() {
    let ids: Vec<i64> = (1..=150).collect();
    let batches = partition(&ids, 100);
    assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![100, 50]);
    assert_eq!(batches.concat(), ids);
  }

  #[test]
  fn partition_of_exact_multiple_and_empty() {
    let ids: Vec<i64> = (1..=200).collect();
    assert_eq!(partition(&ids, 100).len(), 2);
    assert!(partition(&[], 100).is_empty());
  }

  #[test]
  fn local_authorities_are_unique_first_name_wins() {
    let with_la = |urn, code: i64, name: &str| Establishment {
      urn,
      local_authority_code: Some(code),
      local_authority_name: Some(name.into()),
      ..Default::default()
    };
    let establishments = vec![
      with_la(1, 101, "First"),
      with_la(2, 101, "Second"),
      with_la(3, 202, "Other"),
      with_la(4, 101, "Third"),
      with_la(5, 202, "Renamed"),
      Establishment { urn: 6, ..Default::default() },
    ];

    let las = derive_local_authorities(&establishments);
    assert_eq!(las, vec![
      LocalAuthority { code: 101, name: "First".into() },
      LocalAuthority { code: 202, name: "Other".into() },
    ]);
  }

  #[test]
  fn members_go_to_group_or_local_authority() {
    let establishments = vec![
      Establishment { urn: 1, trust_uid: Some(10), local_authority_code: Some(101), ..Default::default() },
      Establishment { urn: 2, local_authority_code: Some(101), ..Default::default() },
      // Trust not in the download: falls back to its LA.
      Establishment { urn: 3, trust_uid: Some(99), local_authority_code: Some(101), ..Default::default() },
    ];
    let members = Membership::of(&establishments, &[10]);
    assert_eq!(members.of_group(10), &[1]);
    assert_eq!(members.of_local_authority(101), &[2, 3]);
    assert!(members.of_group(99).is_empty());
  }
}
