//! Purging of staged days past the retention window.

use chrono::{Days, NaiveDate};
use gias_core::{
  events::EventPublisher,
  mapping::Mapper,
  model::{Entity, EntityType, Establishment, Group, LocalAuthority},
  queue::ProcessingQueue,
  source::SourceClient,
  store::EntityRepository,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{CacheManager, CacheStore};
use crate::{Error, Result, cancel::guard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TidySummary {
  pub entity_type:  EntityType,
  pub days_cleared: usize,
  pub rows_deleted: u64,
  /// The watermark after this run.
  pub watermark:    NaiveDate,
}

impl<Src, St, Q, P, M> CacheManager<Src, St, Q, P, M>
where
  Src: SourceClient,
  St: CacheStore,
  Q: ProcessingQueue,
  P: EventPublisher,
  M: Mapper,
{
  /// Clear every staged day older than the retention window, per entity type,
  /// oldest first. The watermark is saved after each day so an interrupted
  /// run resumes where it stopped.
  pub async fn tidy_cache(&self, cancel: &CancellationToken) -> Result<Vec<TidySummary>> {
    let today = self.clock.today();
    let retention = u64::from(self.settings.number_of_days_to_retain_staging_data);
    let cutoff = today
      .checked_sub_days(Days::new(retention))
      .unwrap_or(NaiveDate::MIN);
    info!(%today, %cutoff, "tidying staging");

    Ok(vec![
      self.tidy::<Establishment>(cutoff, cancel).await?,
      self.tidy::<Group>(cutoff, cancel).await?,
      self.tidy::<LocalAuthority>(cutoff, cancel).await?,
    ])
  }

  async fn tidy<T: Entity>(
    &self,
    cutoff: NaiveDate,
    cancel: &CancellationToken,
  ) -> Result<TidySummary>
  where
    St: EntityRepository<T>,
  {
    let entity_type = T::ENTITY_TYPE;
    let mut watermark = guard(
      cancel,
      self.store.get_last_staging_date_cleared(entity_type),
      Error::Store,
    )
    .await?
    .unwrap_or(self.settings.staging_epoch);

    let mut summary = TidySummary {
      entity_type,
      days_cleared: 0,
      rows_deleted: 0,
      watermark,
    };

    while watermark < cutoff {
      let Some(day) = watermark.succ_opt() else { break };
      let deleted = guard(
        cancel,
        EntityRepository::<T>::clear_staging_for_date(&self.store, day),
        Error::Store,
      )
      .await?;
      guard(
        cancel,
        self.store.set_last_staging_date_cleared(entity_type, day),
        Error::Store,
      )
      .await?;
      debug!(%entity_type, %day, deleted, "cleared staging day");

      watermark = day;
      summary.days_cleared += 1;
      summary.rows_deleted += deleted;
    }

    summary.watermark = watermark;
    info!(
      %entity_type,
      days_cleared = summary.days_cleared,
      rows_deleted = summary.rows_deleted,
      %watermark,
      "staging tidied"
    );
    Ok(summary)
  }
}
