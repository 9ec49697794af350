//! Job definitions and the in-memory job store.

use std::{fmt, sync::Arc};

use crate::{
    domain::{ChatId, JobId},
    filter::KeywordSet,
    Error, Result,
};

/// One relay unit: messages from `sources` that pass `keywords` go to `destination`.
///
/// Immutable once created. Runners share it through an `Arc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardingJob {
    id: JobId,
    sources: Vec<ChatId>,
    destination: ChatId,
    keywords: KeywordSet,
}

impl ForwardingJob {
    pub fn new(id: JobId, sources: Vec<ChatId>, destination: ChatId, keywords: KeywordSet) -> Self {
        Self {
            id,
            sources,
            destination,
            keywords,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn sources(&self) -> &[ChatId] {
        &self.sources
    }

    pub fn destination(&self) -> ChatId {
        self.destination
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }
}

impl fmt::Display for ForwardingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources = self
            .sources
            .iter()
            .map(ChatId::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let keywords = self.keywords.iter().collect::<Vec<_>>().join(", ");
        write!(
            f,
            "{}. [{sources}] → {}, keywords=[{keywords}]",
            self.id.0, self.destination
        )
    }
}

/// Ordered, append-only collection of jobs for the lifetime of the process.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Vec<Arc<ForwardingJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a job with the next ordinal id.
    pub fn add_job(
        &mut self,
        sources: Vec<ChatId>,
        destination: Option<ChatId>,
        keywords: KeywordSet,
    ) -> Result<Arc<ForwardingJob>> {
        let Some(destination) = destination else {
            return Err(Error::InvalidJob(
                "destination chat id is required".to_string(),
            ));
        };
        if sources.is_empty() {
            return Err(Error::InvalidJob(
                "at least one source chat id is required".to_string(),
            ));
        }

        let mut unique = Vec::with_capacity(sources.len());
        for chat in sources {
            if !unique.contains(&chat) {
                unique.push(chat);
            }
        }

        let job = Arc::new(ForwardingJob::new(
            JobId(self.jobs.len() + 1),
            unique,
            destination,
            keywords,
        ));
        self.jobs.push(job.clone());
        Ok(job)
    }

    /// Jobs in insertion order. Call again to iterate from the start.
    pub fn list_jobs(&self) -> impl Iterator<Item = &Arc<ForwardingJob>> + '_ {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Parse a comma-separated list of chat ids.
pub fn parse_chat_ids(input: &str) -> Result<Vec<ChatId>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_chat_id)
        .collect()
}

pub fn parse_chat_id(input: &str) -> Result<ChatId> {
    let s = input.trim();
    s.parse::<i64>()
        .map(ChatId)
        .map_err(|_| Error::InvalidJob(format!("invalid chat id: {s:?}")))
}
