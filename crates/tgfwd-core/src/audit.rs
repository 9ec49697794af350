use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{domain::ChatId, jobs::ForwardingJob, Result};

/// One forwarding session start. Written once, never updated.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEntry {
    #[serde(serialize_with = "rfc3339")]
    pub timestamp: DateTime<Local>,
    pub job_id: usize,
    pub sources: Vec<i64>,
    pub destination: i64,
    pub keywords: Vec<String>,
}

impl AuditEntry {
    pub fn session_start(job: &ForwardingJob) -> Self {
        Self {
            timestamp: Local::now(),
            job_id: job.id().0,
            sources: job.sources().iter().map(|c| c.0).collect(),
            destination: job.destination().0,
            keywords: job.keywords().as_slice().to_vec(),
        }
    }

    /// Tab-separated line: `timestamp  sources  destination  keywords`.
    fn to_text_line(&self) -> String {
        let sources = self
            .sources
            .iter()
            .map(|id| ChatId(*id).to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}\t{}\t{}\t{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            sources,
            self.destination,
            self.keywords.join(",")
        )
    }
}

fn rfc3339<S: serde::Serializer>(ts: &DateTime<Local>, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339())
}

/// Append-only sink for forwarding session metadata.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, entry: &AuditEntry) -> Result<()> {
        let line = if self.json {
            serde_json::to_string(entry)?
        } else {
            entry.to_text_line()
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::JobId, filter::KeywordSet};

    fn job() -> ForwardingJob {
        ForwardingJob::new(
            JobId(1),
            vec![ChatId(111), ChatId(333)],
            ChatId(222),
            KeywordSet::new(["urgent", "news"]),
        )
    }

    #[test]
    fn text_line_has_tab_separated_fields() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLogger::new(dir.path().join("history.txt"), false);
        log.write(&AuditEntry::session_start(&job())).unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let fields: Vec<_> = written.trim_end().split('\t').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].len(), "2026-01-01 00:00:00".len());
        assert_eq!(&fields[1..], &["111,333", "222", "urgent,news"]);
    }

    #[test]
    fn writes_append_and_never_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");
        std::fs::write(&path, "existing line\n").unwrap();

        let log = AuditLogger::new(&path, false);
        log.write(&AuditEntry::session_start(&job())).unwrap();
        log.write(&AuditEntry::session_start(&job())).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "existing line");
    }

    #[test]
    fn json_mode_writes_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLogger::new(dir.path().join("history.jsonl"), true);
        log.write(&AuditEntry::session_start(&job())).unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let v: serde_json::Value = serde_json::from_str(written.trim_end()).unwrap();
        assert_eq!(v["job_id"], 1);
        assert_eq!(v["sources"], serde_json::json!([111, 333]));
        assert_eq!(v["destination"], 222);
        assert_eq!(v["keywords"], serde_json::json!(["urgent", "news"]));
        assert!(v["timestamp"].as_str().unwrap().contains('T'));
    }
}
