//! Integration tests for the SQLite adapters against an in-memory database.

use chrono::NaiveDate;
use gias_core::{
  domain::{LearningProvider, ManagementGroup, ManagementGroupType},
  events::EventPublisher,
  model::{
    CodeNamePair, EntityType, Establishment, Group, LocalAuthority, PointInTime,
    StagingBatchQueueItem,
  },
  queue::ProcessingQueue,
  store::{EntityRepository, StateRepository},
};

use crate::{EventKind, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, d).unwrap() }

fn school(urn: i64, name: &str) -> Establishment {
  Establishment {
    urn,
    name: name.into(),
    establishment_status: Some(CodeNamePair::new("1", "Open")),
    local_authority_code: Some(202),
    local_authority_name: Some("Camden".into()),
    ..Default::default()
  }
}

// ─── Staging & current ───────────────────────────────────────────────────────

#[tokio::test]
async fn staging_round_trips_and_upserts() {
  let s = store().await;
  EntityRepository::<Establishment>::store_in_staging(&s, vec![
    PointInTime::staged(school(1, "First"), day(1)),
    PointInTime::staged(school(2, "Second"), day(1)),
  ])
  .await
  .unwrap();
  // Replaying the same key overwrites.
  EntityRepository::<Establishment>::store_in_staging(&s, vec![PointInTime::staged(
    school(1, "First again"),
    day(1),
  )])
  .await
  .unwrap();

  let staged: PointInTime<Establishment> =
    s.get_from_staging(1, day(1)).await.unwrap().unwrap();
  assert_eq!(staged.name, "First again");
  assert_eq!(staged.point_in_time, day(1));
  assert!(!staged.is_current);

  let other_day: Option<PointInTime<Establishment>> =
    s.get_from_staging(1, day(2)).await.unwrap();
  assert!(other_day.is_none());
}

#[tokio::test]
async fn large_snapshot_is_written_in_chunks() {
  let s = store().await;
  let items: Vec<_> = (1..=1234)
    .map(|urn| PointInTime::staged(school(urn, "School"), day(1)))
    .collect();
  EntityRepository::<Establishment>::store_in_staging(&s, items).await.unwrap();

  let last: Option<PointInTime<Establishment>> =
    s.get_from_staging(1234, day(1)).await.unwrap();
  assert!(last.is_some());
  let cleared = EntityRepository::<Establishment>::clear_staging_for_date(&s, day(1))
    .await
    .unwrap();
  assert_eq!(cleared, 1234);
}

#[tokio::test]
async fn current_row_is_replaced_per_id() {
  let s = store().await;
  let missing: Option<PointInTime<Establishment>> = s.get(1).await.unwrap();
  assert!(missing.is_none());

  s.store(PointInTime::staged(school(1, "Old"), day(1)).into_current())
    .await
    .unwrap();
  s.store(PointInTime::staged(school(1, "New"), day(2)).into_current())
    .await
    .unwrap();

  let current: PointInTime<Establishment> = s.get(1).await.unwrap().unwrap();
  assert_eq!(current.name, "New");
  assert_eq!(current.point_in_time, day(2));
  assert!(current.is_current);
}

#[tokio::test]
async fn entity_types_are_partitioned() {
  let s = store().await;
  s.store(PointInTime::staged(school(202, "School 202"), day(1)))
    .await
    .unwrap();
  s.store(PointInTime::staged(
    LocalAuthority { code: 202, name: "Camden".into() },
    day(1),
  ))
  .await
  .unwrap();

  let la: PointInTime<LocalAuthority> = s.get(202).await.unwrap().unwrap();
  assert_eq!(la.name, "Camden");
  let group: Option<PointInTime<Group>> = s.get(202).await.unwrap();
  assert!(group.is_none());
}

#[tokio::test]
async fn clear_removes_one_day_of_one_type() {
  let s = store().await;
  EntityRepository::<Establishment>::store_in_staging(&s, vec![
    PointInTime::staged(school(1, "A"), day(1)),
    PointInTime::staged(school(1, "A"), day(2)),
  ])
  .await
  .unwrap();
  EntityRepository::<LocalAuthority>::store_in_staging(&s, vec![PointInTime::staged(
    LocalAuthority { code: 202, name: "Camden".into() },
    day(1),
  )])
  .await
  .unwrap();

  let cleared = EntityRepository::<Establishment>::clear_staging_for_date(&s, day(1))
    .await
    .unwrap();
  assert_eq!(cleared, 1);

  let gone: Option<PointInTime<Establishment>> = s.get_from_staging(1, day(1)).await.unwrap();
  let kept: Option<PointInTime<Establishment>> = s.get_from_staging(1, day(2)).await.unwrap();
  let la: Option<PointInTime<LocalAuthority>> = s.get_from_staging(202, day(1)).await.unwrap();
  assert!(gone.is_none());
  assert!(kept.is_some());
  assert!(la.is_some());

  // Clearing an empty day is fine.
  let none = EntityRepository::<Group>::clear_staging_for_date(&s, day(9))
    .await
    .unwrap();
  assert_eq!(none, 0);
}

// ─── State ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn watermark_is_per_entity_type() {
  let s = store().await;
  assert_eq!(
    s.get_last_staging_date_cleared(EntityType::Group).await.unwrap(),
    None
  );

  s.set_last_staging_date_cleared(EntityType::Group, day(3)).await.unwrap();
  s.set_last_staging_date_cleared(EntityType::Group, day(4)).await.unwrap();

  assert_eq!(
    s.get_last_staging_date_cleared(EntityType::Group).await.unwrap(),
    Some(day(4))
  );
  assert_eq!(
    s.get_last_staging_date_cleared(EntityType::Establishment).await.unwrap(),
    None
  );
}

// ─── Queue ───────────────────────────────────────────────────────────────────

fn item(parent: Option<i64>, ids: &[i64]) -> StagingBatchQueueItem {
  StagingBatchQueueItem {
    parent_identifier: parent,
    identifiers:       ids.to_vec(),
    point_in_time:     day(1),
  }
}

#[tokio::test]
async fn queue_delivers_oldest_first_until_acknowledged() {
  let s = store().await;
  let q = s.queue(3);
  q.enqueue_batch(EntityType::Group, item(Some(16720), &[1, 2])).await.unwrap();
  q.enqueue_batch(EntityType::Group, item(None, &[16720])).await.unwrap();
  q.enqueue_batch(EntityType::Establishment, item(None, &[9])).await.unwrap();
  assert_eq!(q.depth(EntityType::Group).await.unwrap(), 2);

  let first = q.receive(EntityType::Group).await.unwrap().unwrap();
  assert_eq!(first.item, item(Some(16720), &[1, 2]));
  assert_eq!(first.attempts, 1);

  // Unacknowledged items are redelivered.
  let again = q.receive(EntityType::Group).await.unwrap().unwrap();
  assert_eq!(again.item_id, first.item_id);
  assert_eq!(again.attempts, 2);

  assert!(q.acknowledge(first.item_id).await.unwrap());
  assert!(!q.acknowledge(first.item_id).await.unwrap());

  let second = q.receive(EntityType::Group).await.unwrap().unwrap();
  assert_eq!(second.item, item(None, &[16720]));
  q.acknowledge(second.item_id).await.unwrap();

  assert!(q.receive(EntityType::Group).await.unwrap().is_none());
  assert_eq!(q.depth(EntityType::Establishment).await.unwrap(), 1);
}

#[tokio::test]
async fn queue_stops_delivering_at_attempt_limit() {
  let s = store().await;
  let q = s.queue(2);
  q.enqueue_batch(EntityType::LocalAuthority, item(Some(202), &[]))
    .await
    .unwrap();

  assert!(q.receive(EntityType::LocalAuthority).await.unwrap().is_some());
  assert!(q.receive(EntityType::LocalAuthority).await.unwrap().is_some());
  assert!(q.receive(EntityType::LocalAuthority).await.unwrap().is_none());
  assert_eq!(q.depth(EntityType::LocalAuthority).await.unwrap(), 0);
  assert_eq!(q.dead_letters(EntityType::LocalAuthority).await.unwrap(), 1);
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn outbox_records_events_in_order() {
  let s = store().await;
  let outbox = s.outbox();

  let group = ManagementGroup {
    code:                   "LA-202".into(),
    group_type:             ManagementGroupType::LocalAuthority,
    type_name:              "Local Authority".into(),
    identifier:             "202".into(),
    name:                   "Camden".into(),
    status:                 None,
    companies_house_number: None,
    ukprn:                  None,
    open_date:              None,
    close_date:             None,
    address:                None,
  };
  let provider = LearningProvider {
    urn:                         100001,
    ukprn:                       None,
    uprn:                        None,
    name:                        "Hill Primary".into(),
    establishment_number:        None,
    provider_type:               None,
    provider_type_group:         None,
    provider_status:             Some("Open".into()),
    phase_of_education:          None,
    open_date:                   None,
    close_date:                  None,
    statutory_low_age:           None,
    statutory_high_age:          None,
    local_authority_code:        Some(202),
    companies_house_number:      None,
    charities_commission_number: None,
    address:                     Default::default(),
    website:                     None,
    telephone:                   None,
    management_group:            Some(group.clone()),
  };

  outbox.publish_management_group_created(group, day(1)).await.unwrap();
  outbox
    .publish_learning_provider_updated(provider, day(2))
    .await
    .unwrap();

  let events = outbox.events().await.unwrap();
  assert_eq!(events.len(), 2);
  assert_eq!(events[0].kind, EventKind::ManagementGroupCreated);
  assert_eq!(events[0].subject, "LA-202");
  assert_eq!(events[0].point_in_time, day(1));
  assert_eq!(events[1].kind, EventKind::LearningProviderUpdated);
  assert_eq!(events[1].subject, "100001");
  assert_eq!(events[1].payload["management_group"]["code"], "LA-202");
  assert_ne!(events[0].event_id, events[1].event_id);
}
