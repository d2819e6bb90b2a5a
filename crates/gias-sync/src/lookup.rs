//! Point lookups of single learning providers and management groups.
//!
//! Lookups read either the live source or the current partition and never
//! touch staging, the queues or the publisher. Identifiers are validated
//! before any collaborator is called.

use gias_core::{
  domain::{LearningProvider, ManagementGroup, ManagementGroupCode, ManagementGroupType},
  mapping::Mapper,
  model::{Establishment, Group, LocalAuthority},
  source::SourceClient,
  store::EntityRepository,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
  Error, LookupError,
  cache::CacheStore,
  cancel::guard,
  mapping::{map_learning_provider, map_management_group},
};

/// Where a lookup reads from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupSource {
  /// The upstream source client.
  Live,
  /// The current partition of the cache.
  #[default]
  Cache,
}

// ─── Shared reads ─────────────────────────────────────────────────────────────

struct Reader<'a, Src, St> {
  source: &'a Src,
  store:  &'a St,
  from:   LookupSource,
  cancel: &'a CancellationToken,
}

impl<Src: SourceClient, St: CacheStore> Reader<'_, Src, St> {
  async fn establishment(&self, urn: i64) -> Result<Option<Establishment>, Error> {
    match self.from {
      LookupSource::Live => {
        guard(self.cancel, self.source.get_establishment(urn), Error::Source).await
      }
      LookupSource::Cache => Ok(
        guard(
          self.cancel,
          EntityRepository::<Establishment>::get(self.store, urn),
          Error::Store,
        )
        .await?
        .map(|p| p.into_inner()),
      ),
    }
  }

  async fn group(&self, uid: i64) -> Result<Option<Group>, Error> {
    match self.from {
      LookupSource::Live => {
        guard(self.cancel, self.source.get_group(uid), Error::Source).await
      }
      LookupSource::Cache => Ok(
        guard(self.cancel, EntityRepository::<Group>::get(self.store, uid), Error::Store)
          .await?
          .map(|p| p.into_inner()),
      ),
    }
  }

  /// The source has no local authority lookup, so these always come from
  /// the current partition.
  async fn local_authority(&self, code: i64) -> Result<Option<LocalAuthority>, Error> {
    Ok(
      guard(
        self.cancel,
        EntityRepository::<LocalAuthority>::get(self.store, code),
        Error::Store,
      )
      .await?
      .map(|p| p.into_inner()),
    )
  }
}

// ─── Learning providers ───────────────────────────────────────────────────────

pub struct LearningProviderManager<Src, St, M> {
  source: Src,
  store:  St,
  mapper: M,
}

impl<Src, St, M> LearningProviderManager<Src, St, M>
where
  Src: SourceClient,
  St: CacheStore,
  M: Mapper,
{
  pub fn new(source: Src, store: St, mapper: M) -> Self {
    Self { source, store, mapper }
  }

  /// Look up a learning provider by URN. Returns `Ok(None)` if there is no
  /// such establishment.
  ///
  /// A trust member is linked to its group, read from the same place as the
  /// establishment; if the group is missing or cannot be mapped the provider
  /// keeps its local authority link.
  pub async fn get_learning_provider(
    &self,
    id: &str,
    from: LookupSource,
    cancel: &CancellationToken,
  ) -> Result<Option<LearningProvider>, LookupError> {
    let urn = parse_identifier(id)?;
    let reader = Reader {
      source: &self.source,
      store: &self.store,
      from,
      cancel,
    };

    let Some(establishment) = reader.establishment(urn).await? else {
      debug!(urn, ?from, "learning provider not found");
      return Ok(None);
    };

    let link = match establishment.trust_uid {
      Some(uid) => self.trust_link(&reader, uid).await?,
      None => None,
    };
    let provider =
      map_learning_provider(&self.mapper, &establishment, link.as_ref()).await?;
    Ok(Some(provider))
  }

  async fn trust_link(
    &self,
    reader: &Reader<'_, Src, St>,
    uid: i64,
  ) -> Result<Option<ManagementGroup>, Error> {
    let Some(group) = reader.group(uid).await? else {
      debug!(uid, "linked group not found");
      return Ok(None);
    };
    match map_management_group(&self.mapper, &group).await {
      Ok(link) => Ok(Some(link)),
      Err(e) => {
        warn!(uid, error = %e, "cannot map linked group, using default link");
        Ok(None)
      }
    }
  }
}

// ─── Management groups ────────────────────────────────────────────────────────

pub struct ManagementGroupManager<Src, St, M> {
  source: Src,
  store:  St,
  mapper: M,
}

impl<Src, St, M> ManagementGroupManager<Src, St, M>
where
  Src: SourceClient,
  St: CacheStore,
  M: Mapper,
{
  pub fn new(source: Src, store: St, mapper: M) -> Self {
    Self { source, store, mapper }
  }

  /// Look up a management group by its `"{TYPE}-{id}"` code.
  ///
  /// A group whose actual type differs from the code's prefix is treated as
  /// not found, so `SAT-16720` does not resolve a multi-academy trust.
  pub async fn get_management_group(
    &self,
    code: &str,
    from: LookupSource,
    cancel: &CancellationToken,
  ) -> Result<Option<ManagementGroup>, LookupError> {
    let parsed: ManagementGroupCode =
      code.trim().parse().map_err(|e: gias_core::Error| LookupError::Validation {
        id:     code.to_owned(),
        reason: e.to_string(),
      })?;
    let reader = Reader {
      source: &self.source,
      store: &self.store,
      from,
      cancel,
    };

    let group = match parsed.group_type {
      ManagementGroupType::LocalAuthority => {
        match reader.local_authority(parsed.identifier).await? {
          Some(la) => Some(map_management_group(&self.mapper, &la).await?),
          None => None,
        }
      }
      _ => match reader.group(parsed.identifier).await? {
        Some(group) => Some(map_management_group(&self.mapper, &group).await?),
        None => None,
      },
    };

    match group {
      Some(group) if group.group_type == parsed.group_type => Ok(Some(group)),
      Some(group) => {
        debug!(%code, actual = %group.group_type, "management group type mismatch");
        Ok(None)
      }
      None => {
        debug!(%code, ?from, "management group not found");
        Ok(None)
      }
    }
  }
}

fn parse_identifier(id: &str) -> Result<i64, LookupError> {
  let invalid = |reason: &str| LookupError::Validation {
    id:     id.to_owned(),
    reason: reason.to_owned(),
  };
  match id.trim().parse::<i64>() {
    Ok(urn) if urn > 0 => Ok(urn),
    Ok(_) => Err(invalid("identifier must be positive")),
    Err(_) => Err(invalid("identifier must be an integer")),
  }
}

#[cfg(test)]
mod tests {
  use gias_core::model::PointInTime;

  use super::*;
  use crate::{
    GiasMapper,
    test_support::{MapTranslator, MemorySource, MemoryStore, date, establishment, trust},
  };

  fn providers(
    source: &MemorySource,
    store: &MemoryStore,
  ) -> LearningProviderManager<MemorySource, MemoryStore, GiasMapper<MapTranslator>> {
    LearningProviderManager::new(
      source.clone(),
      store.clone(),
      GiasMapper::new(MapTranslator::default()),
    )
  }

  fn groups(
    source: &MemorySource,
    store: &MemoryStore,
  ) -> ManagementGroupManager<MemorySource, MemoryStore, GiasMapper<MapTranslator>> {
    ManagementGroupManager::new(
      source.clone(),
      store.clone(),
      GiasMapper::new(MapTranslator::default()),
    )
  }

  #[tokio::test]
  async fn invalid_urn_is_rejected_before_any_call() {
    let source = MemorySource::new(vec![establishment(1, "A", 202)], vec![]);
    let store = MemoryStore::default();
    let manager = providers(&source, &store);
    let cancel = CancellationToken::new();

    for id in ["abc", "", "12x", "-4"] {
      let err = manager
        .get_learning_provider(id, LookupSource::Live, &cancel)
        .await
        .unwrap_err();
      assert!(matches!(err, LookupError::Validation { .. }), "{id:?}");
    }
    assert_eq!(source.call_count(), 0);
  }

  #[tokio::test]
  async fn live_lookup_links_trust_from_source() {
    let mut academy = establishment(100, "Oak Academy", 202);
    academy.trust_uid = Some(16720);
    let source = MemorySource::new(vec![academy], vec![trust(16720, "Oak Trust")]);
    let store = MemoryStore::default();
    let cancel = CancellationToken::new();

    let provider = providers(&source, &store)
      .get_learning_provider("100", LookupSource::Live, &cancel)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(provider.management_group.unwrap().code, "MAT-16720");
  }

  #[tokio::test]
  async fn cache_lookup_reads_current_only() {
    let source = MemorySource::new(vec![establishment(100, "Live", 202)], vec![]);
    let store = MemoryStore::default();
    let cancel = CancellationToken::new();
    let manager = providers(&source, &store);

    assert!(
      manager
        .get_learning_provider("100", LookupSource::Cache, &cancel)
        .await
        .unwrap()
        .is_none()
    );

    store.put_current(PointInTime::staged(
      establishment(100, "Cached", 202),
      date(2024, 3, 1),
    ));
    let provider = manager
      .get_learning_provider("100", LookupSource::Cache, &cancel)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(provider.name, "Cached");
    assert_eq!(provider.management_group.unwrap().code, "LA-202");
    assert_eq!(source.call_count(), 0);
  }

  #[tokio::test]
  async fn malformed_group_codes_are_validation_errors() {
    let source = MemorySource::default();
    let store = MemoryStore::default();
    let manager = groups(&source, &store);
    let cancel = CancellationToken::new();

    for code in ["LA-x", "XYZ-1", "202"] {
      let err = manager
        .get_management_group(code, LookupSource::Live, &cancel)
        .await
        .unwrap_err();
      assert!(matches!(err, LookupError::Validation { .. }), "{code:?}");
    }
    assert_eq!(source.call_count(), 0);
  }

  #[tokio::test]
  async fn local_authority_codes_come_from_the_cache() {
    let source = MemorySource::default();
    let store = MemoryStore::default();
    store.put_current(PointInTime::staged(
      LocalAuthority { code: 202, name: "Camden".into() },
      date(2024, 3, 1),
    ));

    let group = groups(&source, &store)
      .get_management_group("LA-202", LookupSource::Live, &CancellationToken::new())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(group.name, "Camden");
    assert_eq!(group.group_type, ManagementGroupType::LocalAuthority);
    assert_eq!(source.call_count(), 0);
  }

  #[tokio::test]
  async fn group_with_different_type_is_not_found() {
    let source = MemorySource::new(vec![], vec![trust(16720, "Oak Trust")]);
    let store = MemoryStore::default();
    let manager = groups(&source, &store);
    let cancel = CancellationToken::new();

    let found = manager
      .get_management_group("mat-16720", LookupSource::Live, &cancel)
      .await
      .unwrap();
    assert_eq!(found.unwrap().code, "MAT-16720");

    let mismatched = manager
      .get_management_group("SAT-16720", LookupSource::Live, &cancel)
      .await
      .unwrap();
    assert!(mismatched.is_none());
  }
}
