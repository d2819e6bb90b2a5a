//! SQL schema for the GIAS SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per (entity, id, day) as downloaded. Cleared by the tidy-up.
CREATE TABLE IF NOT EXISTS staging (
    entity_type   TEXT    NOT NULL,   -- 'establishment' | 'group' | 'local_authority'
    id            INTEGER NOT NULL,
    point_in_time TEXT    NOT NULL,   -- YYYY-MM-DD
    payload       TEXT    NOT NULL,   -- JSON of the source record
    PRIMARY KEY (entity_type, id, point_in_time)
);

-- The last promoted snapshot per id.
CREATE TABLE IF NOT EXISTS current_entities (
    entity_type   TEXT    NOT NULL,
    id            INTEGER NOT NULL,
    point_in_time TEXT    NOT NULL,
    payload       TEXT    NOT NULL,
    PRIMARY KEY (entity_type, id)
);

CREATE TABLE IF NOT EXISTS staging_state (
    entity_type               TEXT PRIMARY KEY,
    last_staging_date_cleared TEXT NOT NULL
);

-- Acknowledged items are deleted; items at the attempt limit stay behind as
-- dead letters.
CREATE TABLE IF NOT EXISTS queue_items (
    item_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    queue       TEXT    NOT NULL,
    payload     TEXT    NOT NULL,   -- JSON StagingBatchQueueItem
    enqueued_at TEXT    NOT NULL,   -- RFC 3339 UTC
    attempts    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS outbox (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id      TEXT    NOT NULL UNIQUE,
    kind          TEXT    NOT NULL,   -- EventKind
    subject       TEXT    NOT NULL,   -- URN or management group code
    payload       TEXT    NOT NULL,   -- JSON of the published shape
    point_in_time TEXT    NOT NULL,
    recorded_at   TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS staging_day_idx  ON staging(entity_type, point_in_time);
CREATE INDEX IF NOT EXISTS queue_items_idx  ON queue_items(queue, attempts, item_id);

PRAGMA user_version = 1;
";
