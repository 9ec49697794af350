//! Headless mode: start every configured job and run until told to stop.

use std::{future::Future, time::Duration};

use crate::{context::AppContext, supervisor::StartOutcome, Error, Result};

const REAP_INTERVAL: Duration = Duration::from_millis(500);

/// Why a headless run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadlessExit {
    /// The shutdown signal fired.
    Shutdown,
    /// Every runner ended on its own.
    AllRunnersExited,
}

/// Start all jobs, then wait for `shutdown` or for every runner to end.
///
/// Fails up front when there is nothing to run: no jobs, or no job could be
/// started. Runners are always stopped before returning.
pub async fn run_headless<S>(ctx: &mut AppContext, shutdown: S) -> Result<HeadlessExit>
where
    S: Future<Output = ()>,
{
    if ctx.jobs.is_empty() {
        return Err(Error::Config("no jobs configured".to_string()));
    }

    let reports = ctx.supervisor.start_all(&ctx.jobs).await;
    let started = reports
        .iter()
        .filter(|r| matches!(r.outcome, StartOutcome::Started))
        .count();
    if started == 0 {
        return Err(Error::Config("none of the configured jobs could start".to_string()));
    }
    tracing::info!(
        started,
        total = reports.len(),
        running = ?ctx.supervisor.running_jobs(),
        "headless forwarding running"
    );

    tokio::pin!(shutdown);
    let mut tick = tokio::time::interval(REAP_INTERVAL);
    let exit = loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break HeadlessExit::Shutdown;
            }
            _ = tick.tick() => {
                for exit in ctx.supervisor.reap_finished().await {
                    tracing::error!(job = %exit.job_id, error = %exit.error, "runner exited");
                }
                if ctx.supervisor.is_idle() {
                    tracing::warn!("no runners left");
                    break HeadlessExit::AllRunnersExited;
                }
            }
        }
    };

    ctx.supervisor.stop_all().await;
    Ok(exit)
}
