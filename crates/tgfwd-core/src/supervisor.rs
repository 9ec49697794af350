//! Lifecycle management for job runners.
//!
//! The supervisor is the only owner of runner handles. Runners never touch
//! the handle map; they only report how they ended through their join handle.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    audit::{AuditEntry, AuditLogger},
    domain::JobId,
    jobs::{ForwardingJob, JobStore},
    messaging::port::ChatPlatform,
    runner::{JobRunner, RunExit, RunnerStats, StatsSnapshot},
    Error,
};

struct RunnerHandle {
    job: Arc<ForwardingJob>,
    cancel: CancellationToken,
    handle: JoinHandle<RunExit>,
    stats: Arc<RunnerStats>,
}

impl RunnerHandle {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Outcome of starting one job.
#[derive(Debug)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    Failed(Error),
}

#[derive(Debug)]
pub struct StartReport {
    pub job_id: JobId,
    pub outcome: StartOutcome,
}

/// Outcome of a `stop_all` call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Runners that acknowledged cancellation within the grace period.
    pub stopped: Vec<JobId>,
    /// Runners that had to be aborted after the grace period.
    pub forced: Vec<JobId>,
}

impl StopReport {
    pub fn is_empty(&self) -> bool {
        self.stopped.is_empty() && self.forced.is_empty()
    }
}

/// A runner that ended without being asked to.
#[derive(Debug)]
pub struct RunnerExit {
    pub job_id: JobId,
    pub error: Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerStatus {
    pub job_id: JobId,
    pub running: bool,
    pub stats: StatsSnapshot,
}

pub struct Supervisor {
    platform: Arc<dyn ChatPlatform>,
    audit: AuditLogger,
    stop_grace: Duration,
    runners: BTreeMap<JobId, RunnerHandle>,
}

impl Supervisor {
    pub fn new(platform: Arc<dyn ChatPlatform>, audit: AuditLogger, stop_grace: Duration) -> Self {
        Self {
            platform,
            audit,
            stop_grace,
            runners: BTreeMap::new(),
        }
    }

    /// Start a runner for every job in `jobs` that is not already running.
    ///
    /// Each job starts independently: a job that fails to start is reported
    /// and the remaining jobs still start. Runners that exited on their own
    /// are collected first, so their jobs are started again.
    pub async fn start_all(&mut self, jobs: &JobStore) -> Vec<StartReport> {
        for exit in self.reap_finished().await {
            tracing::warn!(job = %exit.job_id, error = %exit.error, "restarting runner that had exited");
        }

        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs.list_jobs() {
            let job_id = job.id();
            if self.runners.contains_key(&job_id) {
                tracing::info!(job = %job_id, "already running, start ignored");
                reports.push(StartReport {
                    job_id,
                    outcome: StartOutcome::AlreadyRunning,
                });
                continue;
            }

            let outcome = match self.start_one(job.clone()).await {
                Ok(()) => StartOutcome::Started,
                Err(e) => {
                    tracing::error!(job = %job_id, error = %e, "runner failed to start");
                    StartOutcome::Failed(e)
                }
            };
            reports.push(StartReport { job_id, outcome });
        }
        reports
    }

    async fn start_one(&mut self, job: Arc<ForwardingJob>) -> crate::Result<()> {
        let runner = JobRunner::prepare(job.clone(), self.platform.clone()).await?;

        if let Err(e) = self.audit.write(&AuditEntry::session_start(&job)) {
            tracing::warn!(
                job = %job.id(),
                path = %self.audit.path().display(),
                error = %e,
                "failed to append audit entry"
            );
        }

        let cancel = CancellationToken::new();
        let stats = runner.stats();
        let handle = tokio::spawn(runner.run(cancel.clone()));
        self.runners.insert(
            job.id(),
            RunnerHandle {
                job,
                cancel,
                handle,
                stats,
            },
        );
        Ok(())
    }

    /// Cancel every runner and wait for them to finish.
    ///
    /// All runners share one grace period; any still alive when it runs out
    /// is aborted. A no-op when nothing is running.
    pub async fn stop_all(&mut self) -> StopReport {
        let mut report = StopReport::default();
        if self.runners.is_empty() {
            tracing::info!("stop requested with no runners active");
            return report;
        }

        for runner in self.runners.values() {
            runner.cancel.cancel();
        }

        let deadline = Instant::now() + self.stop_grace;
        let runners = std::mem::take(&mut self.runners);
        for (job_id, mut runner) in runners {
            match tokio::time::timeout_at(deadline, &mut runner.handle).await {
                Ok(Ok(RunExit::Failed(e))) => {
                    tracing::warn!(job = %job_id, error = %e, "runner had already failed");
                    report.stopped.push(job_id);
                }
                Ok(Ok(RunExit::Cancelled)) => report.stopped.push(job_id),
                Ok(Err(join_err)) => {
                    tracing::error!(job = %job_id, error = %join_err, "runner task panicked");
                    report.stopped.push(job_id);
                }
                Err(_) => {
                    tracing::warn!(
                        job = %job_id,
                        grace_ms = self.stop_grace.as_millis() as u64,
                        "runner did not stop in time, aborting"
                    );
                    runner.handle.abort();
                    report.forced.push(job_id);
                }
            }
        }

        tracing::info!(
            stopped = report.stopped.len(),
            forced = report.forced.len(),
            "all runners stopped"
        );
        report
    }

    /// Remove runners whose task has ended on its own and report why.
    pub async fn reap_finished(&mut self) -> Vec<RunnerExit> {
        let finished: Vec<JobId> = self
            .runners
            .iter()
            .filter(|(_, r)| !r.is_running())
            .map(|(id, _)| *id)
            .collect();

        let mut exits = Vec::new();
        for job_id in finished {
            let Some(runner) = self.runners.remove(&job_id) else {
                continue;
            };
            let error = match runner.handle.await {
                Ok(RunExit::Failed(e)) => e,
                Ok(RunExit::Cancelled) => continue,
                Err(join_err) => Error::External(format!("runner task panicked: {join_err}")),
            };
            exits.push(RunnerExit { job_id, error });
        }
        exits
    }

    pub fn running_jobs(&self) -> Vec<JobId> {
        self.runners
            .iter()
            .filter(|(_, r)| r.is_running())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_idle(&self) -> bool {
        self.runners.is_empty()
    }

    pub fn status(&self) -> Vec<RunnerStatus> {
        self.runners
            .values()
            .map(|r| RunnerStatus {
                job_id: r.job.id(),
                running: r.is_running(),
                stats: r.stats.snapshot(),
            })
            .collect()
    }
}
