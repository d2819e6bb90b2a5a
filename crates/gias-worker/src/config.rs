//! Worker configuration, deserialised from `gias.toml` and `GIAS_*`
//! environment variables.

use std::path::PathBuf;

use gias_sync::CacheSettings;
use serde::Deserialize;

/// Runtime configuration. Every field has a default, so an absent config file
/// is fine.
///
/// Environment variables use a single `_` after the prefix and `__` between
/// nested keys, e.g. `GIAS_STORE_PATH` or `GIAS_CACHE__BATCH_SIZE`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
  /// SQLite database holding staging, current, queues and the outbox.
  pub store_path:          PathBuf,
  /// JSON array of establishments, as exported from the source.
  pub establishments_path: PathBuf,
  /// JSON array of groups.
  pub groups_path:         PathBuf,
  /// Optional JSON translation table; without one no code is translated.
  pub translations_path:   Option<PathBuf>,
  /// Deliveries before a queue item is left as a dead letter.
  pub queue_max_attempts:  u32,
  pub cache:               CacheSettings,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      store_path:          PathBuf::from("gias.db"),
      establishments_path: PathBuf::from("data/establishments.json"),
      groups_path:         PathBuf::from("data/groups.json"),
      translations_path:   None,
      queue_max_attempts:  5,
      cache:               CacheSettings::default(),
    }
  }
}

impl WorkerConfig {
  /// Layer the optional TOML file at `path` with the environment.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.into()).required(false))
      .add_source(
        config::Environment::with_prefix("GIAS")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }
}
