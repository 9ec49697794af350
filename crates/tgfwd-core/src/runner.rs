//! Forwarding job runner: one live relay loop per job.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio_util::sync::CancellationToken;

use crate::{
    filter,
    jobs::ForwardingJob,
    messaging::{
        hub::Subscription,
        port::ChatPlatform,
        types::{IncomingMessage, MessageView},
    },
    Error, Result,
};

const PREVIEW_CHARS: usize = 60;

/// Counters owned by a runner, readable by the supervisor.
#[derive(Debug, Default)]
pub struct RunnerStats {
    relayed: AtomicU64,
    filtered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub relayed: u64,
    pub filtered: u64,
    pub failed: u64,
    /// Events lost because the runner fell behind the update stream.
    pub dropped: u64,
}

impl RunnerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            relayed: self.relayed.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Why a runner loop ended.
#[derive(Debug)]
pub enum RunExit {
    /// Stop was requested.
    Cancelled,
    /// The subscription was lost; the runner cannot continue.
    Failed(Error),
}

/// A runner that has validated its job and holds a live subscription.
pub struct JobRunner {
    job: Arc<ForwardingJob>,
    platform: Arc<dyn ChatPlatform>,
    subscription: Subscription,
    stats: Arc<RunnerStats>,
}

impl JobRunner {
    /// Validate the job against the session and subscribe to its sources.
    ///
    /// Fails when the job has no sources, the platform cannot forward
    /// natively, or the destination cannot be resolved.
    pub async fn prepare(job: Arc<ForwardingJob>, platform: Arc<dyn ChatPlatform>) -> Result<Self> {
        if job.sources().is_empty() {
            return Err(Error::InvalidJob(format!(
                "job {} has no source chats",
                job.id()
            )));
        }

        if !platform.capabilities().native_forward {
            return Err(Error::Forward(
                "platform cannot forward messages natively".to_string(),
            ));
        }

        let destination = platform.resolve_chat(job.destination()).await?;
        tracing::debug!(
            job = %job.id(),
            destination = %destination.chat_id,
            title = %destination.title,
            "destination resolved"
        );

        let subscription = platform.subscribe(job.sources()).await?;
        Ok(Self {
            job,
            platform,
            subscription,
            stats: Arc::new(RunnerStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<RunnerStats> {
        self.stats.clone()
    }

    /// Relay loop. Returns on cancellation or when the subscription is lost.
    ///
    /// Cancellation is checked while waiting for the next event; a forward
    /// that is already in flight is allowed to finish.
    pub async fn run(mut self, cancel: CancellationToken) -> RunExit {
        let job_id = self.job.id();
        tracing::info!(
            job = %job_id,
            sources = self.job.sources().len(),
            destination = %self.job.destination(),
            "runner started"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(job = %job_id, "runner stopped");
                    return RunExit::Cancelled;
                }
                next = self.subscription.recv() => next,
            };

            let dropped = self.subscription.take_dropped();
            if dropped > 0 {
                self.stats.dropped.fetch_add(dropped, Ordering::Relaxed);
            }

            match next {
                Ok(msg) => self.handle(&msg).await,
                Err(e) => {
                    tracing::error!(job = %job_id, error = %e, "runner lost its subscription");
                    return RunExit::Failed(e);
                }
            }
        }
    }

    async fn handle(&self, msg: &IncomingMessage) {
        let job_id = self.job.id();
        if !filter::matches(msg, self.job.keywords()) {
            self.stats.filtered.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                job = %job_id,
                chat = %msg.chat_id(),
                message = msg.message_id.0,
                text = %preview(msg),
                "no keyword match, skipped"
            );
            return;
        }

        match self.platform.forward(msg, self.job.destination()).await {
            Ok(copy) => {
                self.stats.relayed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    job = %job_id,
                    chat = %msg.chat_id(),
                    message = msg.message_id.0,
                    forwarded_as = copy.message_id.0,
                    "message relayed"
                );
            }
            Err(e) => {
                // One bad message never ends the runner.
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    job = %job_id,
                    chat = %msg.chat_id(),
                    message = msg.message_id.0,
                    error = %e,
                    "forward failed, message skipped"
                );
            }
        }
    }
}

fn preview(msg: &IncomingMessage) -> String {
    match msg.text() {
        Some(text) if text.chars().count() > PREVIEW_CHARS => {
            let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
            out.push_str("...");
            out
        }
        Some(text) => text.to_string(),
        None if msg.has_media() => "<media>".to_string(),
        None => String::new(),
    }
}
