//! [`SqliteOutbox`] is an [`EventPublisher`] that appends each event to the
//! `outbox` table for a relay to forward downstream.

use chrono::{DateTime, NaiveDate, Utc};
use gias_core::{
  domain::{LearningProvider, ManagementGroup},
  events::EventPublisher,
};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{decode_date, decode_dt, encode_date, encode_dt},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
  LearningProviderCreated,
  LearningProviderUpdated,
  ManagementGroupCreated,
  ManagementGroupUpdated,
}

/// One stored event, in the order it was published.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
  pub event_id:      Uuid,
  pub kind:          EventKind,
  /// URN for learning providers, management group code for groups.
  pub subject:       String,
  pub payload:       serde_json::Value,
  pub point_in_time: NaiveDate,
  pub recorded_at:   DateTime<Utc>,
}

struct RawEvent {
  event_id:      String,
  kind:          String,
  subject:       String,
  payload:       String,
  point_in_time: String,
  recorded_at:   String,
}

impl RawEvent {
  fn into_event(self) -> Result<OutboxEvent> {
    Ok(OutboxEvent {
      event_id:      Uuid::parse_str(&self.event_id)?,
      kind:          self.kind.parse().map_err(|_| Error::UnknownValue {
        what:  "event kind",
        value: self.kind.clone(),
      })?,
      subject:       self.subject,
      payload:       serde_json::from_str(&self.payload)?,
      point_in_time: decode_date(&self.point_in_time)?,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}

#[derive(Clone)]
pub struct SqliteOutbox {
  conn: tokio_rusqlite::Connection,
}

impl SqliteOutbox {
  pub(crate) fn new(conn: tokio_rusqlite::Connection) -> Self { Self { conn } }

  /// Every stored event, oldest first.
  pub async fn events(&self) -> Result<Vec<OutboxEvent>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, kind, subject, payload, point_in_time, recorded_at
           FROM outbox ORDER BY seq",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawEvent {
              event_id:      row.get(0)?,
              kind:          row.get(1)?,
              subject:       row.get(2)?,
              payload:       row.get(3)?,
              point_in_time: row.get(4)?,
              recorded_at:   row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn append(
    &self,
    kind: EventKind,
    subject: String,
    payload: &impl Serialize,
    point_in_time: NaiveDate,
  ) -> Result<()> {
    let event_id = Uuid::new_v4();
    let id_str = event_id.hyphenated().to_string();
    let kind_str = kind.as_ref().to_owned();
    let payload = serde_json::to_string(payload)?;
    let day = encode_date(point_in_time);
    let now = encode_dt(Utc::now());

    self
      .conn
      .call({
        let subject = subject.clone();
        move |conn| {
          conn.execute(
            "INSERT INTO outbox (event_id, kind, subject, payload, point_in_time, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id_str, kind_str, subject, payload, day, now],
          )?;
          Ok(())
        }
      })
      .await?;

    debug!(%event_id, %kind, %subject, %point_in_time, "event recorded");
    Ok(())
  }
}

impl EventPublisher for SqliteOutbox {
  type Error = Error;

  async fn publish_learning_provider_created(
    &self,
    provider: LearningProvider,
    point_in_time: NaiveDate,
  ) -> Result<()> {
    let subject = provider.urn.to_string();
    self
      .append(EventKind::LearningProviderCreated, subject, &provider, point_in_time)
      .await
  }

  async fn publish_learning_provider_updated(
    &self,
    provider: LearningProvider,
    point_in_time: NaiveDate,
  ) -> Result<()> {
    let subject = provider.urn.to_string();
    self
      .append(EventKind::LearningProviderUpdated, subject, &provider, point_in_time)
      .await
  }

  async fn publish_management_group_created(
    &self,
    group: ManagementGroup,
    point_in_time: NaiveDate,
  ) -> Result<()> {
    let subject = group.code.clone();
    self
      .append(EventKind::ManagementGroupCreated, subject, &group, point_in_time)
      .await
  }

  async fn publish_management_group_updated(
    &self,
    group: ManagementGroup,
    point_in_time: NaiveDate,
  ) -> Result<()> {
    let subject = group.code.clone();
    self
      .append(EventKind::ManagementGroupUpdated, subject, &group, point_in_time)
      .await
  }
}
