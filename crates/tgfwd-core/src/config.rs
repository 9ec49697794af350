use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    domain::ChatId,
    errors::Error,
    filter::KeywordSet,
    jobs::JobStore,
    messaging::throttled::ForwardPacing,
    Result,
};

const DEFAULT_STOP_GRACE_MS: u64 = 5_000;
const DEFAULT_UPDATE_BUFFER: usize = 256;

/// Typed configuration for the forwarder.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub credentials_file: PathBuf,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,

    // Dialog export
    pub dialogs_dir: PathBuf,

    // Runtime
    pub stop_grace: Duration,
    pub update_buffer: usize,
    pub throttle: ForwardPacing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            audit_log_path: PathBuf::from("forward_history.txt"),
            audit_log_json: false,
            dialogs_dir: PathBuf::from("."),
            stop_grace: Duration::from_millis(DEFAULT_STOP_GRACE_MS),
            update_buffer: DEFAULT_UPDATE_BUFFER,
            throttle: ForwardPacing::default(),
        }
    }
}

/// A job record as read from the configuration file, before validation.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub sources: Vec<i64>,
    pub destination: Option<i64>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A job entry that was skipped at load time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Zero-based position in the `jobs` array.
    pub index: usize,
    pub reason: String,
}

/// Result of reading the configuration file.
#[derive(Debug, Default)]
pub struct LoadedConfig {
    pub config: Config,
    /// Decoded job entries with their position in the `jobs` array.
    pub jobs: Vec<(usize, JobSpec)>,
    pub issues: Vec<ConfigIssue>,
}

impl LoadedConfig {
    /// Build the job store, appending store-level validation failures to `issues`.
    pub fn into_store(self) -> (Config, JobStore, Vec<ConfigIssue>) {
        let mut store = JobStore::new();
        let mut issues = self.issues;
        for (index, spec) in self.jobs {
            let sources = spec.sources.into_iter().map(ChatId).collect();
            let keywords = KeywordSet::new(&spec.keywords);
            if let Err(e) = store.add_job(sources, spec.destination.map(ChatId), keywords) {
                issues.push(ConfigIssue {
                    index,
                    reason: e.to_string(),
                });
            }
        }
        issues.sort_by_key(|i| i.index);
        (self.config, store, issues)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    credentials_file: Option<PathBuf>,
    audit_log: Option<PathBuf>,
    audit_log_json: Option<bool>,
    dialogs_dir: Option<PathBuf>,
    stop_grace_ms: Option<u64>,
    update_buffer: Option<usize>,
    #[serde(default)]
    throttle: RawThrottle,
    #[serde(default)]
    jobs: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawThrottle {
    global_min_interval_ms: Option<u64>,
    per_chat_min_interval_ms: Option<u64>,
}

impl Config {
    /// Load the configuration file at `path`.
    ///
    /// A missing file yields defaults and no jobs. A file that is not valid
    /// JSON is an error; individual malformed job entries are not, they are
    /// reported in [`LoadedConfig::issues`] and skipped.
    pub fn load(path: &Path) -> Result<LoadedConfig> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no configuration file, using defaults");
            return Ok(LoadedConfig::default());
        }
        let content = fs::read_to_string(path)?;
        parse_config(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

fn parse_config(content: &str) -> Result<LoadedConfig> {
    let raw: RawConfig = serde_json::from_str(content)?;
    let defaults = Config::default();
    let default_throttle = defaults.throttle;

    let config = Config {
        credentials_file: raw.credentials_file.unwrap_or(defaults.credentials_file),
        audit_log_path: raw.audit_log.unwrap_or(defaults.audit_log_path),
        audit_log_json: raw.audit_log_json.unwrap_or(defaults.audit_log_json),
        dialogs_dir: raw.dialogs_dir.unwrap_or(defaults.dialogs_dir),
        stop_grace: raw
            .stop_grace_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.stop_grace),
        update_buffer: raw.update_buffer.unwrap_or(defaults.update_buffer).max(1),
        throttle: ForwardPacing {
            global_gap: raw
                .throttle
                .global_min_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(default_throttle.global_gap),
            per_destination_gap: raw
                .throttle
                .per_chat_min_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(default_throttle.per_destination_gap),
        },
    };

    let mut jobs = Vec::new();
    let mut issues = Vec::new();
    for (index, value) in raw.jobs.into_iter().enumerate() {
        match serde_json::from_value::<JobSpec>(value) {
            Ok(spec) => jobs.push((index, spec)),
            Err(e) => issues.push(ConfigIssue {
                index,
                reason: e.to_string(),
            }),
        }
    }

    Ok(LoadedConfig {
        config,
        jobs,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobId;

    #[test]
    fn empty_object_yields_defaults() {
        let loaded = parse_config("{}").unwrap();
        assert_eq!(loaded.config, Config::default());
        assert!(loaded.jobs.is_empty());
        assert!(loaded.issues.is_empty());
    }

    #[test]
    fn settings_override_defaults() {
        let loaded = parse_config(
            r#"{
              "audit_log": "/var/log/fwd.txt",
              "audit_log_json": true,
              "stop_grace_ms": 250,
              "update_buffer": 0,
              "throttle": { "per_chat_min_interval_ms": 3000 }
            }"#,
        )
        .unwrap();
        let cfg = loaded.config;
        assert_eq!(cfg.audit_log_path, PathBuf::from("/var/log/fwd.txt"));
        assert!(cfg.audit_log_json);
        assert_eq!(cfg.stop_grace, Duration::from_millis(250));
        assert_eq!(cfg.update_buffer, 1);
        assert_eq!(cfg.throttle.per_destination_gap, Duration::from_secs(3));
        assert_eq!(
            cfg.throttle.global_gap,
            ForwardPacing::default().global_gap
        );
    }

    #[test]
    fn malformed_job_entries_are_skipped_and_reported() {
        let loaded = parse_config(
            r#"{
              "jobs": [
                { "sources": [111], "destination": 222, "keywords": ["urgent"] },
                { "sources": "111", "destination": 222 },
                { "sources": [5], "keywords": ["x"] },
                { "sources": [], "destination": 9 },
                { "sources": [7, 8], "destination": -1009 }
              ]
            }"#,
        )
        .unwrap();
        let (_, store, issues) = loaded.into_store();

        let kept: Vec<_> = store
            .list_jobs()
            .map(|j| (j.id(), j.sources().to_vec(), j.destination()))
            .collect();
        assert_eq!(
            kept,
            vec![
                (JobId(1), vec![ChatId(111)], ChatId(222)),
                (JobId(2), vec![ChatId(7), ChatId(8)], ChatId(-1009)),
            ]
        );
        let bad: Vec<_> = issues.iter().map(|i| i.index).collect();
        assert_eq!(bad, vec![1, 2, 3]);
    }

    #[test]
    fn store_rejections_keep_their_position_in_the_file() {
        let loaded = parse_config(
            r#"{
              "jobs": [
                { "sources": "bad", "destination": 1 },
                { "sources": 2, "destination": 1 },
                { "sources": [3], "destination": 4 },
                { "sources": [], "destination": 5 }
              ]
            }"#,
        )
        .unwrap();
        let (_, store, issues) = loaded.into_store();

        assert_eq!(store.len(), 1);
        let by_index: Vec<_> = issues.iter().map(|i| (i.index, i.reason.as_str())).collect();
        assert_eq!(by_index.len(), 3);
        assert_eq!(by_index[0].0, 0);
        assert_eq!(by_index[1].0, 1);
        assert_eq!(
            by_index[2],
            (3, "invalid job: at least one source chat id is required")
        );
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forwarder.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.jobs.is_empty());
    }
}
