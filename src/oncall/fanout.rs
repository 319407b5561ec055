//! Concurrent schedule detail lookup.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use super::provider::OnCallProvider;
use crate::models::oncall::ScheduleDetail;
use crate::{AppError, Result};

/// Fetch the details of every schedule concurrently.
///
/// One task is spawned per id. Results are written into a buffer slot
/// matching the id's position, so the output order always equals the input
/// order no matter which request finishes first. All tasks are joined before
/// anything is returned; the first failure aborts the rest.
///
/// # Errors
///
/// Returns the first provider error, or `AppError::Provider` if a task
/// panicked.
pub async fn fetch_schedule_details(
    provider: Arc<dyn OnCallProvider>,
    schedule_ids: &[String],
) -> Result<Vec<ScheduleDetail>> {
    let mut tasks = JoinSet::new();
    for (index, schedule_id) in schedule_ids.iter().cloned().enumerate() {
        let provider = Arc::clone(&provider);
        tasks.spawn(async move {
            let detail = provider.get_schedule(&schedule_id).await;
            (index, detail)
        });
    }

    let mut slots: Vec<Option<ScheduleDetail>> = vec![None; schedule_ids.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, detail) = joined
            .map_err(|err| AppError::Provider(format!("schedule detail task failed: {err}")))?;
        debug!(index, "schedule detail fetched");
        slots[index] = Some(detail?);
    }

    slots
        .into_iter()
        .zip(schedule_ids)
        .map(|(slot, schedule_id)| {
            slot.ok_or_else(|| {
                AppError::Provider(format!("no detail returned for schedule {schedule_id}"))
            })
        })
        .collect()
}
