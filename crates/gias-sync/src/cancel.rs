//! Racing collaborator calls against a cancellation token.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::{BoxError, Error, Result};

/// Await `fut` unless `cancel` fires first. The token is polled first, so an
/// already-cancelled token never starts the call.
pub(crate) async fn guard<T, E, F>(
  cancel: &CancellationToken,
  fut: F,
  wrap: fn(BoxError) -> Error,
) -> Result<T>
where
  F: Future<Output = Result<T, E>>,
  E: std::error::Error + Send + Sync + 'static,
{
  tokio::select! {
    biased;
    _ = cancel.cancelled() => Err(Error::Cancelled),
    res = fut => res.map_err(|e| wrap(Box::new(e))),
  }
}

pub(crate) fn check(cancel: &CancellationToken) -> Result<()> {
  if cancel.is_cancelled() {
    Err(Error::Cancelled)
  } else {
    Ok(())
  }
}
