//! In-memory fakes for every collaborator the cache manager talks to.
//!
//! Each fake is a cheap clone over shared state so tests can keep a handle
//! after moving one into a [`CacheManager`](crate::CacheManager).

use std::{
  collections::{BTreeMap, HashMap},
  convert::Infallible,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::NaiveDate;
use gias_core::{
  domain::{LearningProvider, ManagementGroup},
  events::EventPublisher,
  mapping::{EnumerationName, Translator},
  model::{
    CodeNamePair, Entity, EntityType, Establishment, Group, PointInTime,
    StagingBatchQueueItem,
  },
  queue::ProcessingQueue,
  source::SourceClient,
  store::{EntityRepository, StateRepository},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("injected failure: {0}")]
pub struct FakeError(pub String);

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn establishment(urn: i64, name: &str, la_code: i64) -> Establishment {
  Establishment {
    urn,
    name: name.into(),
    establishment_status: Some(CodeNamePair::new("1", "Open")),
    local_authority_code: Some(la_code),
    local_authority_name: Some(format!("Authority {la_code}")),
    ..Default::default()
  }
}

pub fn trust(uid: i64, name: &str) -> Group {
  Group {
    uid,
    name: name.into(),
    group_type: Some(CodeNamePair::new("06", "Multi-academy trust")),
    ..Default::default()
  }
}

// ─── Source ───────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemorySource {
  pub establishments: Arc<Mutex<Vec<Establishment>>>,
  pub groups:         Arc<Mutex<Vec<Group>>>,
  pub calls:          Arc<AtomicUsize>,
}

impl MemorySource {
  pub fn new(establishments: Vec<Establishment>, groups: Vec<Group>) -> Self {
    Self {
      establishments: Arc::new(Mutex::new(establishments)),
      groups:         Arc::new(Mutex::new(groups)),
      calls:          Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn call_count(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl SourceClient for MemorySource {
  type Error = Infallible;

  async fn download_establishments(&self) -> Result<Vec<Establishment>, Infallible> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.establishments.lock().unwrap().clone())
  }

  async fn download_groups(&self) -> Result<Vec<Group>, Infallible> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.groups.lock().unwrap().clone())
  }

  async fn get_establishment(&self, urn: i64) -> Result<Option<Establishment>, Infallible> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.establishments.lock().unwrap().iter().find(|e| e.urn == urn).cloned())
  }

  async fn get_group(&self, uid: i64) -> Result<Option<Group>, Infallible> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.groups.lock().unwrap().iter().find(|g| g.uid == uid).cloned())
  }
}

// ─── Store ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct StoreState {
  staging:       BTreeMap<(EntityType, i64, NaiveDate), serde_json::Value>,
  current:       BTreeMap<(EntityType, i64), serde_json::Value>,
  watermarks:    HashMap<EntityType, NaiveDate>,
  cleared:       Vec<(EntityType, NaiveDate)>,
  failing_reads: Vec<(EntityType, i64)>,
}

/// Rows are held as JSON so one map serves every entity type.
#[derive(Clone, Default)]
pub struct MemoryStore {
  state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
  pub fn put_current<T: Entity>(&self, item: PointInTime<T>) {
    let value = serde_json::to_value(item.clone().into_current()).unwrap();
    self.state.lock().unwrap().current.insert((T::ENTITY_TYPE, item.id()), value);
  }

  pub fn put_staging<T: Entity>(&self, item: PointInTime<T>) {
    let value = serde_json::to_value(&item).unwrap();
    self
      .state
      .lock()
      .unwrap()
      .staging
      .insert((T::ENTITY_TYPE, item.id(), item.point_in_time), value);
  }

  pub fn current<T: Entity>(&self, id: i64) -> Option<PointInTime<T>> {
    let state = self.state.lock().unwrap();
    state
      .current
      .get(&(T::ENTITY_TYPE, id))
      .map(|v| serde_json::from_value(v.clone()).unwrap())
  }

  pub fn staging_rows(&self, entity_type: EntityType) -> Vec<serde_json::Value> {
    let state = self.state.lock().unwrap();
    state
      .staging
      .iter()
      .filter(|((t, _, _), _)| *t == entity_type)
      .map(|(_, v)| v.clone())
      .collect()
  }

  pub fn staging_days(&self, entity_type: EntityType) -> Vec<NaiveDate> {
    let state = self.state.lock().unwrap();
    let mut days: Vec<NaiveDate> = state
      .staging
      .keys()
      .filter(|(t, _, _)| *t == entity_type)
      .map(|(_, _, d)| *d)
      .collect();
    days.sort();
    days.dedup();
    days
  }

  pub fn cleared(&self) -> Vec<(EntityType, NaiveDate)> {
    self.state.lock().unwrap().cleared.clone()
  }

  pub fn watermark(&self, entity_type: EntityType) -> Option<NaiveDate> {
    self.state.lock().unwrap().watermarks.get(&entity_type).copied()
  }

  pub fn set_watermark(&self, entity_type: EntityType, date: NaiveDate) {
    self.state.lock().unwrap().watermarks.insert(entity_type, date);
  }

  /// Make every current-row read for this id fail.
  pub fn fail_reads_of(&self, entity_type: EntityType, id: i64) {
    self.state.lock().unwrap().failing_reads.push((entity_type, id));
  }
}

impl<T: Entity> EntityRepository<T> for MemoryStore {
  type Error = FakeError;

  async fn store_in_staging(&self, items: Vec<PointInTime<T>>) -> Result<(), FakeError> {
    for item in items {
      self.put_staging(item);
    }
    Ok(())
  }

  async fn store(&self, item: PointInTime<T>) -> Result<(), FakeError> {
    self.put_current(item);
    Ok(())
  }

  async fn get(&self, id: i64) -> Result<Option<PointInTime<T>>, FakeError> {
    if self.state.lock().unwrap().failing_reads.contains(&(T::ENTITY_TYPE, id)) {
      return Err(FakeError(format!("read of {} {id}", T::ENTITY_TYPE)));
    }
    Ok(self.current::<T>(id))
  }

  async fn get_from_staging(
    &self,
    id: i64,
    point_in_time: NaiveDate,
  ) -> Result<Option<PointInTime<T>>, FakeError> {
    let state = self.state.lock().unwrap();
    Ok(
      state
        .staging
        .get(&(T::ENTITY_TYPE, id, point_in_time))
        .map(|v| serde_json::from_value(v.clone()).unwrap()),
    )
  }

  async fn clear_staging_for_date(&self, point_in_time: NaiveDate) -> Result<u64, FakeError> {
    let mut state = self.state.lock().unwrap();
    let before = state.staging.len();
    state
      .staging
      .retain(|(t, _, d), _| !(*t == T::ENTITY_TYPE && *d == point_in_time));
    let removed = (before - state.staging.len()) as u64;
    state.cleared.push((T::ENTITY_TYPE, point_in_time));
    Ok(removed)
  }
}

impl StateRepository for MemoryStore {
  type Error = FakeError;

  async fn get_last_staging_date_cleared(
    &self,
    entity_type: EntityType,
  ) -> Result<Option<NaiveDate>, FakeError> {
    Ok(self.watermark(entity_type))
  }

  async fn set_last_staging_date_cleared(
    &self,
    entity_type: EntityType,
    date: NaiveDate,
  ) -> Result<(), FakeError> {
    self.set_watermark(entity_type, date);
    Ok(())
  }
}

// ─── Queue ────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryQueue {
  items: Arc<Mutex<Vec<(EntityType, StagingBatchQueueItem)>>>,
}

impl MemoryQueue {
  pub fn items(&self, queue: EntityType) -> Vec<StagingBatchQueueItem> {
    self
      .items
      .lock()
      .unwrap()
      .iter()
      .filter(|(q, _)| *q == queue)
      .map(|(_, item)| item.clone())
      .collect()
  }

  /// Remove and return everything enqueued so far, in enqueue order.
  pub fn take_all(&self) -> Vec<(EntityType, StagingBatchQueueItem)> {
    std::mem::take(&mut *self.items.lock().unwrap())
  }
}

impl ProcessingQueue for MemoryQueue {
  type Error = Infallible;

  async fn enqueue_batch(
    &self,
    queue: EntityType,
    item: StagingBatchQueueItem,
  ) -> Result<(), Infallible> {
    self.items.lock().unwrap().push((queue, item));
    Ok(())
  }
}

// ─── Publisher ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Published {
  ProviderCreated(LearningProvider, NaiveDate),
  ProviderUpdated(LearningProvider, NaiveDate),
  GroupCreated(ManagementGroup, NaiveDate),
  GroupUpdated(ManagementGroup, NaiveDate),
}

#[derive(Clone, Default)]
pub struct RecordingPublisher {
  events:    Arc<Mutex<Vec<Published>>>,
  fail_urns: Arc<Mutex<Vec<i64>>>,
}

impl RecordingPublisher {
  pub fn events(&self) -> Vec<Published> { self.events.lock().unwrap().clone() }

  pub fn fail_for_urn(&self, urn: i64) { self.fail_urns.lock().unwrap().push(urn); }

  fn provider(&self, event: Published, urn: i64) -> Result<(), FakeError> {
    if self.fail_urns.lock().unwrap().contains(&urn) {
      return Err(FakeError(format!("publish of {urn}")));
    }
    self.events.lock().unwrap().push(event);
    Ok(())
  }
}

impl EventPublisher for RecordingPublisher {
  type Error = FakeError;

  async fn publish_learning_provider_created(
    &self,
    provider: LearningProvider,
    point_in_time: NaiveDate,
  ) -> Result<(), FakeError> {
    let urn = provider.urn;
    self.provider(Published::ProviderCreated(provider, point_in_time), urn)
  }

  async fn publish_learning_provider_updated(
    &self,
    provider: LearningProvider,
    point_in_time: NaiveDate,
  ) -> Result<(), FakeError> {
    let urn = provider.urn;
    self.provider(Published::ProviderUpdated(provider, point_in_time), urn)
  }

  async fn publish_management_group_created(
    &self,
    group: ManagementGroup,
    point_in_time: NaiveDate,
  ) -> Result<(), FakeError> {
    self.events.lock().unwrap().push(Published::GroupCreated(group, point_in_time));
    Ok(())
  }

  async fn publish_management_group_updated(
    &self,
    group: ManagementGroup,
    point_in_time: NaiveDate,
  ) -> Result<(), FakeError> {
    self.events.lock().unwrap().push(Published::GroupUpdated(group, point_in_time));
    Ok(())
  }
}

// ─── Translator ───────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MapTranslator {
  table: HashMap<(EnumerationName, String), String>,
}

impl MapTranslator {
  pub fn with(mut self, enumeration: EnumerationName, from: &str, to: &str) -> Self {
    self.table.insert((enumeration, from.to_owned()), to.to_owned());
    self
  }
}

impl Translator for MapTranslator {
  type Error = Infallible;

  async fn translate<'a>(
    &'a self,
    enumeration: EnumerationName,
    source_value: &'a str,
  ) -> Result<Option<String>, Infallible> {
    Ok(self.table.get(&(enumeration, source_value.to_owned())).cloned())
  }
}
