//! Block report store: append reports keyed by generation-config name, list the most recent,
//! clear all.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::BlockedReport;

/// Error from [`BlockReportStore`] operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReportStoreError {
    #[error("block report store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("block report encode: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only store of blocked reports.
///
/// - `append`: persist one report under `name`; returns where it was stored.
/// - `recent`: newest first, at most `limit`.
/// - `clear`: remove everything; returns how many reports were removed.
#[async_trait]
pub trait BlockReportStore: Send + Sync {
    async fn append(&self, name: &str, report: &BlockedReport) -> Result<String, ReportStoreError>;

    async fn recent(&self, limit: usize) -> Result<Vec<BlockedReport>, ReportStoreError>;

    async fn clear(&self) -> Result<usize, ReportStoreError>;
}

/// Replaces every character outside `[a-zA-Z0-9_-]` with `_`.
pub(crate) fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One pretty-printed JSON file per report: `<YYYYmmdd_HHMMSS_micros>_<seq>_<name>.json`.
///
/// File names sort chronologically, so listing is a reverse name sort. `seq` orders appends
/// within the same microsecond; files are created exclusively, so an append never overwrites.
/// Unreadable or malformed files are skipped when listing.
#[derive(Debug, Clone)]
pub struct FileBlockReportStore {
    dir: PathBuf,
    seq: Arc<AtomicU64>,
}

impl FileBlockReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `~/.hermes/block_reports`.
    pub fn default_location() -> Self {
        Self::new(sdna_config::default_block_reports_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn json_files(&self) -> Result<Vec<PathBuf>, ReportStoreError> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl BlockReportStore for FileBlockReportStore {
    async fn append(&self, name: &str, report: &BlockedReport) -> Result<String, ReportStoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = sanitize_name(name);
        let (path, mut file) = loop {
            let ts = chrono::Local::now().format("%Y%m%d_%H%M%S_%6f");
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) % 1_000_000;
            let path = self.dir.join(format!("{}_{:06}_{}.json", ts, seq, name));
            match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        };
        let path_str = path.to_string_lossy().into_owned();

        let mut stored = report.clone();
        stored.cached_path = Some(path_str.clone());
        let body = serde_json::to_string_pretty(&stored.to_json())?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
        tracing::debug!(path = %path_str, "block report saved");
        Ok(path_str)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<BlockedReport>, ReportStoreError> {
        let files = self.json_files().await?;
        let mut reports = Vec::new();
        for path in files.into_iter().rev() {
            if reports.len() >= limit {
                break;
            }
            let Ok(body) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            match serde_json::from_str::<BlockedReport>(&body) {
                Ok(mut report) => {
                    report.cached_path = Some(path.to_string_lossy().into_owned());
                    reports.push(report);
                }
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable block report"),
            }
        }
        Ok(reports)
    }

    async fn clear(&self) -> Result<usize, ReportStoreError> {
        let files = self.json_files().await?;
        let count = files.len();
        for path in files {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(count)
    }
}

/// In-process store; the default for a [`Runtime`](crate::Runtime) not built from settings.
#[derive(Debug, Default)]
pub struct InMemoryBlockReportStore {
    reports: Mutex<Vec<(String, BlockedReport)>>,
}

impl InMemoryBlockReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the reports were appended under, oldest first.
    pub async fn names(&self) -> Vec<String> {
        self.reports.lock().await.iter().map(|(n, _)| n.clone()).collect()
    }
}

#[async_trait]
impl BlockReportStore for InMemoryBlockReportStore {
    async fn append(&self, name: &str, report: &BlockedReport) -> Result<String, ReportStoreError> {
        let mut reports = self.reports.lock().await;
        let key = format!("memory://{}/{}", sanitize_name(name), reports.len());
        let mut stored = report.clone();
        stored.cached_path = Some(key.clone());
        reports.push((name.to_string(), stored));
        Ok(key)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<BlockedReport>, ReportStoreError> {
        let reports = self.reports.lock().await;
        Ok(reports.iter().rev().take(limit).map(|(_, r)| r.clone()).collect())
    }

    async fn clear(&self) -> Result<usize, ReportStoreError> {
        let mut reports = self.reports.lock().await;
        let count = reports.len();
        reports.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::parse_blocked_from_text;

    fn report(goal: &str) -> BlockedReport {
        parse_blocked_from_text(&format!(
            "<genuinely-blocked>goal: {goal}\nreason: other</genuinely-blocked>"
        ))
        .unwrap()
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_name("gen step/1.v2"), "gen_step_1_v2");
        assert_eq!(sanitize_name("ok-name_9"), "ok-name_9");
    }

    /// **Scenario**: File store writes one file per report and lists newest first.
    #[tokio::test]
    async fn file_store_append_recent_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlockReportStore::new(dir.path().join("reports"));

        assert!(store.recent(10).await.unwrap().is_empty());
        let first = store.append("gen one", &report("first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.append("gen", &report("second")).await.unwrap();

        assert!(first.ends_with("_gen_one.json"), "{}", first);
        let body = std::fs::read_to_string(&first).unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["blocked"], serde_json::json!(true));
        assert_eq!(json["cached_path"], serde_json::json!(first));

        let listed = store.recent(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].goal, "second");
        assert_eq!(listed[1].goal, "first");
        assert_eq!(listed[1].cached_path.as_deref(), Some(first.as_str()));
        assert_eq!(store.recent(1).await.unwrap().len(), 1);

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.recent(10).await.unwrap().is_empty());
    }

    /// **Scenario**: Malformed JSON files are skipped when listing.
    #[tokio::test]
    async fn file_store_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlockReportStore::new(dir.path());
        store.append("ok", &report("fine")).await.unwrap();
        std::fs::write(dir.path().join("99999999_999999_999999_bad.json"), "{not json").unwrap();
        let listed = store.recent(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].goal, "fine");
    }

    /// **Scenario**: A malformed newest file does not use up the limit; older valid reports fill it.
    #[tokio::test]
    async fn file_store_limit_counts_readable_reports_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlockReportStore::new(dir.path());
        store.append("ok", &report("older")).await.unwrap();
        std::fs::write(dir.path().join("99999999_999999_999999_000000_bad.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("99999999_999999_999999_000001_bad.json"), "").unwrap();
        let listed = store.recent(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].goal, "older");
    }

    /// **Scenario**: Appends racing under one name each get their own file.
    #[tokio::test]
    async fn file_store_concurrent_appends_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlockReportStore::new(dir.path());
        let appends = (0..20).map(|i| {
            let store = store.clone();
            async move { store.append("same", &report(&format!("r{}", i))).await.unwrap() }
        });
        let paths = futures::future::join_all(appends).await;
        let unique: std::collections::HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), 20);
        assert_eq!(store.recent(50).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn in_memory_store() {
        let store = InMemoryBlockReportStore::new();
        store.append("a", &report("one")).await.unwrap();
        let key = store.append("b", &report("two")).await.unwrap();
        assert!(key.starts_with("memory://b/"));
        let listed = store.recent(5).await.unwrap();
        assert_eq!(listed[0].goal, "two");
        assert_eq!(store.names().await, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.clear().await.unwrap(), 0);
    }
}
