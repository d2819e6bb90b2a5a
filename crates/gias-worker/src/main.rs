//! gias-worker binary.
//!
//! Reads `gias.toml` (or the path given with `--config`), opens the SQLite
//! store and runs one cache operation. A scheduler calls `download` and
//! `tidy` daily; queue workers call `process-queue`.
//!
//! ```text
//! gias-worker download
//! gias-worker process-queue --entity-type group --limit 50
//! gias-worker process-batch establishment 2024-03-09 100001 100002
//! gias-worker management-group MAT-16720 --live
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gias_core::{
  clock::SystemClock,
  model::{EntityType, StagingBatchQueueItem},
};
use gias_store_sqlite::{SqliteOutbox, SqliteQueue, SqliteStore};
use gias_sync::{
  CacheManager, GiasMapper,
  lookup::{LearningProviderManager, LookupSource, ManagementGroupManager},
};
use gias_worker::{FileSource, TableTranslator, WorkerConfig};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

type Manager =
  CacheManager<FileSource, SqliteStore, SqliteQueue, SqliteOutbox, GiasMapper<TableTranslator>>;

#[derive(Parser)]
#[command(author, version, about = "GIAS cache worker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "gias.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Stage establishments, groups and local authorities and enqueue work.
  Download,

  /// Stage establishments only, in the larger legacy batches.
  DownloadEstablishments,

  /// Receive and process queued items until the queues are empty.
  ProcessQueue {
    /// Only drain this queue (default: all of them).
    #[arg(long)]
    entity_type: Option<EntityType>,

    /// Stop after this many items.
    #[arg(long)]
    limit: Option<usize>,
  },

  /// Reconcile a batch of ids staged at `point_in_time` directly.
  ProcessBatch {
    entity_type:   EntityType,
    point_in_time: NaiveDate,
    ids:           Vec<i64>,

    /// Group UID or LA code; `ids` are then member URNs.
    #[arg(long)]
    parent: Option<i64>,
  },

  /// Purge staged days older than the retention window.
  Tidy,

  /// Print a learning provider as JSON.
  Provider {
    urn: String,

    /// Read from the source instead of the cache.
    #[arg(long)]
    live: bool,
  },

  /// Print a management group (e.g. `LA-202`, `MAT-16720`) as JSON.
  ManagementGroup {
    code: String,

    #[arg(long)]
    live: bool,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = WorkerConfig::load(cli.config.clone())
    .with_context(|| format!("failed to read config from {:?}", cli.config))?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let translator = match &cfg.translations_path {
    Some(path) => TableTranslator::load(path)
      .await
      .context("failed to load translation table")?,
    None => TableTranslator::default(),
  };
  let source = FileSource::new(&cfg.establishments_path, &cfg.groups_path);

  let cancel = CancellationToken::new();
  tokio::spawn({
    let cancel = cancel.clone();
    async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, cancelling");
        cancel.cancel();
      }
    }
  });

  match cli.command {
    Command::Download => {
      let summary = manager(&cfg, source, &store, translator)?
        .download_all_gias_data_to_cache(&cancel)
        .await
        .context("download failed")?;
      print_json(&summary)?;
    }
    Command::DownloadEstablishments => {
      let summary = manager(&cfg, source, &store, translator)?
        .download_establishments_to_cache(&cancel)
        .await
        .context("download failed")?;
      print_json(&summary)?;
    }
    Command::ProcessQueue { entity_type, limit } => {
      let manager = manager(&cfg, source, &store, translator)?;
      let queue = store.queue(cfg.queue_max_attempts);
      let queues = entity_type.map_or_else(|| EntityType::ALL.to_vec(), |t| vec![t]);
      drain(&manager, &queue, &queues, limit, &cancel).await?;
    }
    Command::ProcessBatch { entity_type, point_in_time, ids, parent } => {
      let item = StagingBatchQueueItem {
        parent_identifier: parent,
        identifiers: ids,
        point_in_time,
      };
      let summary = manager(&cfg, source, &store, translator)?
        .process_queue_item(entity_type, &item, &cancel)
        .await
        .context("batch failed")?;
      info!(?summary, "batch processed");
    }
    Command::Tidy => {
      let summaries = manager(&cfg, source, &store, translator)?
        .tidy_cache(&cancel)
        .await
        .context("tidy failed")?;
      for s in summaries {
        info!(
          entity_type = %s.entity_type,
          days_cleared = s.days_cleared,
          rows_deleted = s.rows_deleted,
          watermark = %s.watermark,
          "tidied"
        );
      }
    }
    Command::Provider { urn, live } => {
      let provider = LearningProviderManager::new(source, store, GiasMapper::new(translator))
        .get_learning_provider(&urn, lookup_source(live), &cancel)
        .await
        .with_context(|| format!("lookup of {urn:?} failed"))?;
      print_json(&provider)?;
    }
    Command::ManagementGroup { code, live } => {
      let group = ManagementGroupManager::new(source, store, GiasMapper::new(translator))
        .get_management_group(&code, lookup_source(live), &cancel)
        .await
        .with_context(|| format!("lookup of {code:?} failed"))?;
      print_json(&group)?;
    }
  }

  Ok(())
}

fn manager(
  cfg: &WorkerConfig,
  source: FileSource,
  store: &SqliteStore,
  translator: TableTranslator,
) -> anyhow::Result<Manager> {
  CacheManager::new(
    source,
    store.clone(),
    store.queue(cfg.queue_max_attempts),
    store.outbox(),
    GiasMapper::new(translator),
    Arc::new(SystemClock),
    cfg.cache.clone(),
  )
  .context("invalid cache settings")
}

/// Process items until every queue in `queues` is empty, `limit` items have
/// been handled, or the token is cancelled. Failed items are left
/// unacknowledged for redelivery.
async fn drain(
  manager: &Manager,
  queue: &SqliteQueue,
  queues: &[EntityType],
  limit: Option<usize>,
  cancel: &CancellationToken,
) -> anyhow::Result<()> {
  let mut handled = 0usize;
  for &entity_type in queues {
    while limit.is_none_or(|limit| handled < limit) && !cancel.is_cancelled() {
      let Some(received) = queue
        .receive(entity_type)
        .await
        .context("failed to receive from queue")?
      else {
        break;
      };
      handled += 1;

      match manager.process_queue_item(entity_type, &received.item, cancel).await {
        Ok(summary) => {
          queue
            .acknowledge(received.item_id)
            .await
            .context("failed to acknowledge queue item")?;
          info!(%entity_type, item_id = received.item_id, ?summary, "item processed");
        }
        Err(gias_sync::Error::Cancelled) => break,
        Err(e) => warn!(
          %entity_type,
          item_id = received.item_id,
          attempts = received.attempts,
          error = %e,
          "item failed, leaving for redelivery"
        ),
      }
    }
  }

  for &entity_type in queues {
    let depth = queue.depth(entity_type).await?;
    let dead = queue.dead_letters(entity_type).await?;
    info!(%entity_type, depth, dead_letters = dead, "queue state");
  }
  info!(handled, "queue drain finished");
  Ok(())
}

fn lookup_source(live: bool) -> LookupSource {
  if live { LookupSource::Live } else { LookupSource::Cache }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
