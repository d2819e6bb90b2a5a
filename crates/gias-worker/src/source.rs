//! [`FileSource`], a [`SourceClient`] over JSON snapshot files.
//!
//! Each file is a JSON array of records in the shape of
//! [`Establishment`] / [`Group`]. Files are re-read on every call so a new
//! export can be dropped in place between runs.

use std::path::{Path, PathBuf};

use gias_core::{
  model::{Establishment, Group},
  source::SourceClient,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FileSource {
  establishments_path: PathBuf,
  groups_path:         PathBuf,
}

impl FileSource {
  pub fn new(establishments_path: impl Into<PathBuf>, groups_path: impl Into<PathBuf>) -> Self {
    Self {
      establishments_path: establishments_path.into(),
      groups_path:         groups_path.into(),
    }
  }
}

async fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
  let bytes = tokio::fs::read(path).await.map_err(|source| Error::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let items: Vec<T> = serde_json::from_slice(&bytes).map_err(|source| Error::Json {
    path: path.to_path_buf(),
    source,
  })?;
  debug!(path = %path.display(), count = items.len(), "read snapshot file");
  Ok(items)
}

impl SourceClient for FileSource {
  type Error = Error;

  async fn download_establishments(&self) -> Result<Vec<Establishment>> {
    read_array(&self.establishments_path).await
  }

  async fn download_groups(&self) -> Result<Vec<Group>> {
    read_array(&self.groups_path).await
  }

  async fn get_establishment(&self, urn: i64) -> Result<Option<Establishment>> {
    Ok(
      read_array::<Establishment>(&self.establishments_path)
        .await?
        .into_iter()
        .find(|e| e.urn == urn),
    )
  }

  async fn get_group(&self, uid: i64) -> Result<Option<Group>> {
    Ok(
      read_array::<Group>(&self.groups_path)
        .await?
        .into_iter()
        .find(|g| g.uid == uid),
    )
  }
}
