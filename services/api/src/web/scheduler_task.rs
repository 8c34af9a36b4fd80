//! services/api/src/web/scheduler_task.rs
//!
//! This module contains the background "worker" that polls the wall clock
//! and lets the workflow raise alarms for due tasks.

use eldercare_core::workflow::CareWorkflow;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The long-running scheduler loop.
///
/// Polls every `poll` interval (finer than the minute resolution being
/// matched) until the `CancellationToken` is cancelled.
pub async fn scheduler_process(
    workflow: Arc<CareWorkflow>,
    poll: Duration,
    cancellation_token: CancellationToken,
) {
    info!("Scheduler started, polling every {:?}.", poll);
    let mut interval = time::interval(poll);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Scheduler stopped.");
                return;
            }
            _ = interval.tick() => {
                if let Some(task_id) = workflow.tick().await {
                    info!(%task_id, "Task due; alarm raised.");
                }
            }
        }
    }
}

pub fn spawn_scheduler(
    workflow: Arc<CareWorkflow>,
    poll: Duration,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(scheduler_process(workflow, poll, cancellation_token))
}
