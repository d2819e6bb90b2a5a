//! [`SqliteQueue`]: a durable, at-least-once processing queue.
//!
//! Receiving an item does not remove it: the attempt count is bumped and the
//! item stays visible until it is acknowledged. Items that reach the attempt
//! limit are left in the table as dead letters.

use chrono::Utc;
use gias_core::{
  model::{EntityType, StagingBatchQueueItem},
  queue::ProcessingQueue,
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{
  Result,
  encode::{decode_payload, encode_dt, encode_entity_type},
};

/// A delivered queue item. Pass `item_id` to
/// [`acknowledge`](SqliteQueue::acknowledge) once it is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedItem {
  pub item_id:  i64,
  pub queue:    EntityType,
  /// Deliveries so far, including this one.
  pub attempts: u32,
  pub item:     StagingBatchQueueItem,
}

#[derive(Clone)]
pub struct SqliteQueue {
  conn:         tokio_rusqlite::Connection,
  max_attempts: u32,
}

impl SqliteQueue {
  pub(crate) fn new(conn: tokio_rusqlite::Connection, max_attempts: u32) -> Self {
    Self { conn, max_attempts }
  }

  pub fn max_attempts(&self) -> u32 { self.max_attempts }

  /// Deliver the oldest item on `queue` that is still under the attempt
  /// limit, or `None` if there is nothing to do.
  pub async fn receive(&self, queue: EntityType) -> Result<Option<ReceivedItem>> {
    let q = encode_entity_type(queue);
    let max_attempts = self.max_attempts;

    let raw: Option<(i64, String, u32)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let row: Option<(i64, String, u32)> = tx
          .query_row(
            "SELECT item_id, payload, attempts FROM queue_items
             WHERE queue = ?1 AND attempts < ?2
             ORDER BY item_id
             LIMIT 1",
            rusqlite::params![q, max_attempts],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?;
        if let Some((item_id, _, _)) = &row {
          tx.execute(
            "UPDATE queue_items SET attempts = attempts + 1 WHERE item_id = ?1",
            rusqlite::params![item_id],
          )?;
        }
        tx.commit()?;
        Ok(row)
      })
      .await?;

    let Some((item_id, payload, attempts)) = raw else { return Ok(None) };
    debug!(queue = q, item_id, attempts = attempts + 1, "received queue item");
    Ok(Some(ReceivedItem {
      item_id,
      queue,
      attempts: attempts + 1,
      item: decode_payload(&payload)?,
    }))
  }

  /// Remove a processed item. Returns `false` if it was already gone.
  pub async fn acknowledge(&self, item_id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM queue_items WHERE item_id = ?1",
          rusqlite::params![item_id],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  /// Items on `queue` still eligible for delivery.
  pub async fn depth(&self, queue: EntityType) -> Result<u64> {
    self
      .count("SELECT COUNT(*) FROM queue_items WHERE queue = ?1 AND attempts < ?2", queue)
      .await
  }

  /// Items on `queue` that hit the attempt limit.
  pub async fn dead_letters(&self, queue: EntityType) -> Result<u64> {
    self
      .count("SELECT COUNT(*) FROM queue_items WHERE queue = ?1 AND attempts >= ?2", queue)
      .await
  }

  async fn count(&self, sql: &'static str, queue: EntityType) -> Result<u64> {
    let q = encode_entity_type(queue);
    let max_attempts = self.max_attempts;

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(sql, rusqlite::params![q, max_attempts], |row| row.get(0))?)
      })
      .await?;
    Ok(count.max(0) as u64)
  }
}

impl ProcessingQueue for SqliteQueue {
  type Error = crate::Error;

  async fn enqueue_batch(&self, queue: EntityType, item: StagingBatchQueueItem) -> Result<()> {
    let q = encode_entity_type(queue);
    let payload = serde_json::to_string(&item)?;
    let now = encode_dt(Utc::now());

    let item_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO queue_items (queue, payload, enqueued_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![q, payload, now],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    debug!(queue = q, item_id, ids = item.identifiers.len(), "enqueued batch");
    Ok(())
  }
}
