//! Periodic jobs driven by the worker.
//!
//! Each job runs on a fixed interval until its [`CancellationToken`] is
//! triggered. The first run happens immediately at startup. Every run is
//! bounded by a [`Deadline`]; a run that fails or times out is logged and the
//! job carries on with the next tick.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use assetdesk_core::deadline::Deadline;
use assetdesk_core::error::CoreError;
use assetdesk_core::services::{MaintenanceScheduler, ReportAggregator};

use crate::config::WorkerConfig;

/// Run the maintenance scheduler tick loop.
pub async fn run_scheduler(
    scheduler: MaintenanceScheduler,
    every: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = every.as_secs(), "Scheduler job started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Scheduler job stopping");
                break;
            }
            _ = interval.tick() => {
                let deadline = Deadline::after(timeout);
                match deadline.run("scheduler_tick", scheduler.tick()).await {
                    Ok(outcome) if outcome.marked_overdue > 0 => {
                        tracing::info!(
                            due = outcome.due,
                            marked_overdue = outcome.marked_overdue,
                            "Scheduler tick marked schedules overdue"
                        );
                    }
                    Ok(outcome) => {
                        tracing::debug!(due = outcome.due, "Scheduler tick: nothing to mark");
                    }
                    Err(e) => log_failure("scheduler_tick", &e),
                }
            }
        }
    }
}

/// Run the daily report loop. Each run (re)generates the previous UTC day.
pub async fn run_daily_report(
    reports: ReportAggregator,
    every: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = every.as_secs(), "Daily report job started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Daily report job stopping");
                break;
            }
            _ = interval.tick() => {
                let deadline = Deadline::after(timeout);
                match deadline.run("daily_report", reports.generate_for_yesterday()).await {
                    Ok(report) => {
                        tracing::debug!(
                            report_date = %report.report_date,
                            version = report.version,
                            "Daily report job: report up to date"
                        );
                    }
                    Err(e) => log_failure("daily_report", &e),
                }
            }
        }
    }
}

/// Spawn every job with the intervals from `config`.
pub fn spawn_all(
    scheduler: MaintenanceScheduler,
    reports: ReportAggregator,
    config: &WorkerConfig,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(run_scheduler(
            scheduler,
            config.scheduler_tick,
            config.operation_timeout,
            cancel.clone(),
        )),
        tokio::spawn(run_daily_report(
            reports,
            config.report_interval,
            config.operation_timeout,
            cancel.clone(),
        )),
    ]
}

fn log_failure(job: &'static str, err: &CoreError) {
    if err.is_retryable() {
        tracing::warn!(job, code = err.code(), error = %err, "Job run failed, retrying next tick");
    } else {
        tracing::error!(job, code = err.code(), error = %err, "Job run failed");
    }
}
