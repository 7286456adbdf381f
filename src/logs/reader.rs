//! Snapshot and filtered reads of the two log files.

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use super::cache::{CachedLines, LogCache};
use super::error::LogError;
use super::file::{LogFile, LogPaths};
use super::render::{normalize_levels, render_line};
use super::tailer::for_each_line;
use crate::settings::SettingsStore;

/// Default number of lines delivered in a snapshot.
pub const DEFAULT_SNAPSHOT_LINES: usize = 1000;

/// Default cap on the rendered size of a filtered result.
pub const DEFAULT_FILTER_MAX_BYTES: usize = 128_000;

/// Bounds applied to results handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderLimits {
    /// Most recent lines included in a snapshot.
    pub snapshot_lines: usize,
    /// Soft cap on cumulative rendered bytes of a filtered result.
    pub filter_max_bytes: usize,
}

impl Default for ReaderLimits {
    fn default() -> Self {
        Self {
            snapshot_lines: DEFAULT_SNAPSHOT_LINES,
            filter_max_bytes: DEFAULT_FILTER_MAX_BYTES,
        }
    }
}

/// Split a filter query into its non-empty `|`-separated keywords.
#[must_use]
pub fn parse_query(query: &str) -> Vec<&str> {
    query.split('|').filter(|k| !k.is_empty()).collect()
}

/// Reads the panel's log files through the shared cache, rendering with the
/// current timezone offset.
#[derive(Debug)]
pub struct LogReader {
    paths: LogPaths,
    cache: LogCache,
    settings: Arc<SettingsStore>,
    limits: ReaderLimits,
}

impl LogReader {
    /// Create a reader over `paths`.
    #[must_use]
    pub fn new(
        paths: LogPaths,
        cache: LogCache,
        settings: Arc<SettingsStore>,
        limits: ReaderLimits,
    ) -> Self {
        Self {
            paths,
            cache,
            settings,
            limits,
        }
    }

    /// Path of the selected file.
    #[must_use]
    pub fn path(&self, file: LogFile) -> &Path {
        self.paths.path(file)
    }

    /// The shared line cache.
    #[must_use]
    pub fn cache(&self) -> &LogCache {
        &self.cache
    }

    /// Result bounds in effect.
    #[must_use]
    pub fn limits(&self) -> ReaderLimits {
        self.limits
    }

    /// Timezone offset currently used for rendering.
    #[must_use]
    pub fn timezone_offset(&self) -> i32 {
        self.settings.timezone_offset()
    }

    /// Render raw lines with the current offset, dropping blank results.
    #[must_use]
    pub fn render(&self, raw: &[String]) -> Vec<String> {
        let tz = self.timezone_offset();
        raw.iter()
            .map(|line| render_line(line, tz))
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Current lines of `file`, bounded to the most recent
    /// `snapshot_lines`. `offset` marks where the snapshot ends so a live
    /// viewer can continue from exactly there.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn snapshot(&self, file: LogFile) -> Result<CachedLines, LogError> {
        self.cache
            .refresh(self.path(file), self.timezone_offset(), self.limits.snapshot_lines)
            .await
    }

    /// Every retained line of `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_all(&self, file: LogFile) -> Result<Vec<String>, LogError> {
        let cached = self
            .cache
            .refresh(self.path(file), self.timezone_offset(), usize::MAX)
            .await?;
        Ok(cached.lines)
    }

    /// Lines of `file` containing at least one `|`-separated keyword.
    ///
    /// Matching is a case-sensitive substring test against the raw line with
    /// severity tags normalised, so `ERROR` matches `[Error]`. The result
    /// stops growing once `filter_max_bytes` of rendered output is reached.
    /// A query without keywords returns the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_filtered(&self, file: LogFile, query: &str) -> Result<Vec<String>, LogError> {
        let keywords = parse_query(query);
        if keywords.is_empty() {
            return Ok(self.snapshot(file).await?.lines);
        }

        let tz = self.timezone_offset();
        let cap = self.limits.filter_max_bytes;
        let mut matched = Vec::new();
        let mut total_bytes = 0usize;

        for_each_line(self.path(file), 0, |raw, _| {
            let normalized = normalize_levels(raw);
            if !keywords.iter().any(|k| normalized.contains(k)) {
                return ControlFlow::Continue(());
            }
            let rendered = render_line(raw, tz);
            if rendered.is_empty() {
                return ControlFlow::Continue(());
            }
            total_bytes += rendered.len();
            if total_bytes > cap && !matched.is_empty() {
                return ControlFlow::Break(());
            }
            matched.push(rendered);
            ControlFlow::Continue(())
        })
        .await?;

        Ok(matched)
    }

    /// Truncate `file` to zero bytes and drop its cache entry.
    ///
    /// A file that does not exist counts as already clear.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be truncated.
    pub async fn clear(&self, file: LogFile) -> Result<(), LogError> {
        let path = self.path(file);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .await
        {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(LogError::from_io(path, e)),
        }
        self.cache.invalidate(path);
        tracing::info!(file = %file, path = %path.display(), "Log cleared");
        Ok(())
    }

    /// Drop the cache entry of `file` so the next read re-renders it.
    pub fn invalidate(&self, file: LogFile) {
        self.cache.invalidate(self.path(file));
    }

    /// Settings-change hook: rendered lines embed the timezone offset, so
    /// every cached entry is dropped.
    pub fn on_settings_changed(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AppSettings;

    fn reader_in(dir: &Path, tz: i32, limits: ReaderLimits) -> LogReader {
        let settings = SettingsStore::new(
            dir.join("config.json"),
            AppSettings {
                timezone_offset: tz,
            },
        );
        LogReader::new(
            LogPaths::new(dir.join("error.log"), dir.join("access.log")),
            LogCache::default(),
            Arc::new(settings),
            limits,
        )
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(parse_query("ERROR|WARN"), vec!["ERROR", "WARN"]);
        assert_eq!(parse_query("||a||"), vec!["a"]);
        assert!(parse_query("").is_empty());
    }

    #[tokio::test]
    async fn test_filter_matches_normalized_level() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("error.log"),
            "2024/01/01 10:00:00 [INFO] a\n2024/01/01 10:00:01 [Error] b\n",
        )
        .unwrap();
        let reader = reader_in(dir.path(), 0, ReaderLimits::default());

        let lines = reader.read_filtered(LogFile::Error, "ERROR").await.unwrap();

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("10:00:01"));
        assert!(lines[0].contains("log-badge-error"));
    }

    #[tokio::test]
    async fn test_filter_is_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("access.log"), "Accepted tcp:a.com\n").unwrap();
        let reader = reader_in(dir.path(), 0, ReaderLimits::default());

        let lines = reader.read_filtered(LogFile::Access, "accepted").await.unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_filter_byte_cap_stops_early() {
        let dir = tempfile::tempdir().unwrap();
        let mut text = String::new();
        for i in 0..100 {
            text.push_str(&format!("match {i}\n"));
        }
        std::fs::write(dir.path().join("error.log"), text).unwrap();
        let limits = ReaderLimits {
            filter_max_bytes: 200,
            ..ReaderLimits::default()
        };
        let reader = reader_in(dir.path(), 0, limits);

        let lines = reader.read_filtered(LogFile::Error, "match").await.unwrap();

        assert!(!lines.is_empty());
        assert!(lines.len() < 100);
        assert!(lines[0].contains("match 0<"));
    }

    #[tokio::test]
    async fn test_empty_query_returns_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("error.log"), "a\nb\n").unwrap();
        let reader = reader_in(dir.path(), 0, ReaderLimits::default());

        let lines = reader.read_filtered(LogFile::Error, "|").await.unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_is_tail_bounded_but_read_all_is_not() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("error.log"), "a\nb\nc\n").unwrap();
        let limits = ReaderLimits {
            snapshot_lines: 2,
            ..ReaderLimits::default()
        };
        let reader = reader_in(dir.path(), 0, limits);

        let snapshot = reader.snapshot(LogFile::Error).await.unwrap();
        assert_eq!(snapshot.lines.len(), 2);
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.offset, 6);

        assert_eq!(reader.read_all(LogFile::Error).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_clear_truncates_and_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        std::fs::write(&path, "a\nb\n").unwrap();
        let reader = reader_in(dir.path(), 0, ReaderLimits::default());
        reader.snapshot(LogFile::Error).await.unwrap();

        reader.clear(LogFile::Error).await.unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        assert_eq!(reader.cache().stats().entries, 0);
        assert!(reader.snapshot(LogFile::Error).await.unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_clear_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let reader = reader_in(dir.path(), 0, ReaderLimits::default());

        reader.clear(LogFile::Access).await.unwrap();
        assert!(!dir.path().join("access.log").exists());
    }
}
