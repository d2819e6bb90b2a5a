//! [`SqliteStore`], the SQLite implementation of the staging, current and
//! state repositories.

use std::path::Path;

use chrono::NaiveDate;
use gias_core::{
  model::{Entity, EntityType, PointInTime},
  store::{EntityRepository, StateRepository},
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{
  Result,
  encode::{RawRow, decode_date, decode_payload, encode_date, encode_entity_type},
  outbox::SqliteOutbox,
  queue::SqliteQueue,
  schema::SCHEMA,
};

/// Rows written per transaction by [`EntityRepository::store_in_staging`].
const STAGING_CHUNK: usize = 500;

// ─── Store ───────────────────────────────────────────────────────────────────

/// The GIAS cache backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// A processing queue over the same database. Items delivered
  /// `max_attempts` times are no longer received.
  pub fn queue(&self, max_attempts: u32) -> SqliteQueue {
    SqliteQueue::new(self.conn.clone(), max_attempts)
  }

  /// An event outbox over the same database.
  pub fn outbox(&self) -> SqliteOutbox { SqliteOutbox::new(self.conn.clone()) }

  async fn read_row(
    &self,
    sql: &'static str,
    entity_type: EntityType,
    id: i64,
    point_in_time: Option<NaiveDate>,
  ) -> Result<Option<RawRow>> {
    let et = encode_entity_type(entity_type);
    let day = point_in_time.map(encode_date);

    let raw = self
      .conn
      .call(move |conn| {
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<RawRow> {
          Ok(RawRow {
            point_in_time: row.get(0)?,
            payload:       row.get(1)?,
          })
        };
        let raw = match day {
          Some(day) => conn
            .query_row(sql, rusqlite::params![et, id, day], map)
            .optional()?,
          None => conn.query_row(sql, rusqlite::params![et, id], map).optional()?,
        };
        Ok(raw)
      })
      .await?;
    Ok(raw)
  }
}

fn decode_row<T: Entity>(raw: RawRow, is_current: bool) -> Result<PointInTime<T>> {
  Ok(PointInTime {
    entity:        decode_payload(&raw.payload)?,
    point_in_time: decode_date(&raw.point_in_time)?,
    is_current,
  })
}

// ─── EntityRepository impl ───────────────────────────────────────────────────

impl<T: Entity> EntityRepository<T> for SqliteStore {
  type Error = crate::Error;

  async fn store_in_staging(&self, items: Vec<PointInTime<T>>) -> Result<()> {
    let et = encode_entity_type(T::ENTITY_TYPE);
    let rows = items
      .iter()
      .map(|item| -> Result<(i64, String, String)> {
        Ok((
          item.id(),
          encode_date(item.point_in_time),
          serde_json::to_string(&item.entity)?,
        ))
      })
      .collect::<Result<Vec<_>>>()?;
    let count = rows.len();

    self
      .conn
      .call(move |conn| {
        for chunk in rows.chunks(STAGING_CHUNK) {
          let tx = conn.transaction()?;
          {
            let mut stmt = tx.prepare_cached(
              "INSERT OR REPLACE INTO staging (entity_type, id, point_in_time, payload)
               VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (id, day, payload) in chunk {
              stmt.execute(rusqlite::params![et, id, day, payload])?;
            }
          }
          tx.commit()?;
        }
        Ok(())
      })
      .await?;

    debug!(entity_type = et, count, "wrote staging rows");
    Ok(())
  }

  async fn store(&self, item: PointInTime<T>) -> Result<()> {
    let et = encode_entity_type(T::ENTITY_TYPE);
    let id = item.id();
    let day = encode_date(item.point_in_time);
    let payload = serde_json::to_string(&item.entity)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO current_entities (entity_type, id, point_in_time, payload)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![et, id, day, payload],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get(&self, id: i64) -> Result<Option<PointInTime<T>>> {
    self
      .read_row(
        "SELECT point_in_time, payload FROM current_entities WHERE entity_type = ?1 AND id = ?2",
        T::ENTITY_TYPE,
        id,
        None,
      )
      .await?
      .map(|raw| decode_row(raw, true))
      .transpose()
  }

  async fn get_from_staging(
    &self,
    id: i64,
    point_in_time: NaiveDate,
  ) -> Result<Option<PointInTime<T>>> {
    self
      .read_row(
        "SELECT point_in_time, payload FROM staging
         WHERE entity_type = ?1 AND id = ?2 AND point_in_time = ?3",
        T::ENTITY_TYPE,
        id,
        Some(point_in_time),
      )
      .await?
      .map(|raw| decode_row(raw, false))
      .transpose()
  }

  async fn clear_staging_for_date(&self, point_in_time: NaiveDate) -> Result<u64> {
    let et = encode_entity_type(T::ENTITY_TYPE);
    let day = encode_date(point_in_time);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM staging WHERE entity_type = ?1 AND point_in_time = ?2",
          rusqlite::params![et, day],
        )?)
      })
      .await?;
    Ok(deleted as u64)
  }
}

// ─── StateRepository impl ────────────────────────────────────────────────────

impl StateRepository for SqliteStore {
  type Error = crate::Error;

  async fn get_last_staging_date_cleared(
    &self,
    entity_type: EntityType,
  ) -> Result<Option<NaiveDate>> {
    let et = encode_entity_type(entity_type);

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT last_staging_date_cleared FROM staging_state WHERE entity_type = ?1",
              rusqlite::params![et],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(decode_date).transpose()
  }

  async fn set_last_staging_date_cleared(
    &self,
    entity_type: EntityType,
    date: NaiveDate,
  ) -> Result<()> {
    let et = encode_entity_type(entity_type);
    let day = encode_date(date);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO staging_state (entity_type, last_staging_date_cleared)
           VALUES (?1, ?2)",
          rusqlite::params![et, day],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
