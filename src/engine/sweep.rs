use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::assignment::{AssignmentService, Promotion};
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub due: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Promotes every pending scheduled assignment due at `now`, oldest first.
/// A failing entry never stops the others.
pub async fn sweep_once(service: &AssignmentService, now: DateTime<Utc>) -> SweepReport {
    let mut due: Vec<_> = service
        .scheduled_assignments()
        .into_iter()
        .filter(|entry| entry.is_due(now))
        .collect();
    due.sort_by_key(|entry| entry.execute_at);

    let mut report = SweepReport {
        due: due.len(),
        ..SweepReport::default()
    };

    for entry in due {
        match service.promote_scheduled(entry.id, now).await {
            Ok(Promotion::Completed { .. }) => report.completed += 1,
            Ok(Promotion::Failed { .. }) => report.failed += 1,
            Ok(Promotion::Skipped { .. }) => report.skipped += 1,
            Err(err) => {
                report.errors += 1;
                error!(scheduled_id = %entry.id, error = %err, "scheduled assignment could not be processed");
            }
        }
    }

    report
}

/// Runs [`sweep_once`] on a fixed interval until `shutdown` fires. The first
/// sweep happens immediately.
pub async fn run_scheduler_sweep(
    state: Arc<AppState>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!(interval_secs = interval.as_secs(), "scheduler sweep started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let start = Instant::now();
                let report = sweep_once(&state.assignments, Utc::now()).await;
                state
                    .metrics
                    .sweep_duration_seconds
                    .observe(start.elapsed().as_secs_f64());

                if report.due > 0 {
                    info!(
                        due = report.due,
                        completed = report.completed,
                        failed = report.failed,
                        skipped = report.skipped,
                        errors = report.errors,
                        "scheduler sweep finished"
                    );
                } else {
                    debug!("scheduler sweep found nothing due");
                }
            }
        }
    }

    info!("scheduler sweep stopped");
}
