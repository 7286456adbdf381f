//! Per-file cache of rendered log lines.
//!
//! Each entry remembers how far into the file it has read and the size and
//! modification time seen at that point, so a refresh only renders the bytes
//! appended since the previous one and an unchanged file costs a single
//! `stat`.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use super::error::LogError;
use super::render::render_line;
use super::tailer::{next_line_start, read_lines_from};

/// Default maximum number of rendered lines retained per file.
pub const DEFAULT_MAX_CACHED_LINES: usize = 5000;

/// Default byte budget for the first scan of a large file.
pub const DEFAULT_INITIAL_SCAN_BYTES: u64 = 1024 * 1024;

/// Lines served from the cache together with the position they cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedLines {
    /// Rendered lines, oldest first.
    pub lines: Vec<String>,
    /// Number of lines retained in the cache (before any tail bound).
    pub total: usize,
    /// Byte offset up to which the file has been rendered.
    pub offset: u64,
    /// Whether the file exists.
    pub exists: bool,
}

impl CachedLines {
    fn missing() -> Self {
        Self::default()
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached files.
    pub entries: usize,
    /// Number of refreshes that had to read file content.
    pub scans: u64,
}

#[derive(Debug)]
struct CacheEntry {
    lines: VecDeque<String>,
    last_size: Option<u64>,
    last_modified: Option<SystemTime>,
    last_read_offset: u64,
    /// Timezone offset the retained lines were rendered with.
    tz_offset: Option<i32>,
    last_access: Instant,
}

impl CacheEntry {
    fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            last_size: None,
            last_modified: None,
            last_read_offset: 0,
            tz_offset: None,
            last_access: Instant::now(),
        }
    }

    fn is_fresh(&self, size: u64, modified: Option<SystemTime>, tz_offset: i32) -> bool {
        self.tz_offset == Some(tz_offset)
            && self.last_size == Some(size)
            && modified.is_some()
            && self.last_modified == modified
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.last_size = None;
        self.last_modified = None;
        self.last_read_offset = 0;
        self.tz_offset = None;
    }

    fn view(&self, tail: usize) -> CachedLines {
        let skip = self.lines.len().saturating_sub(tail);
        CachedLines {
            lines: self.lines.iter().skip(skip).cloned().collect(),
            total: self.lines.len(),
            offset: self.last_read_offset,
            exists: true,
        }
    }
}

type SharedEntry = Arc<tokio::sync::Mutex<CacheEntry>>;

/// Cache of rendered lines keyed by file path.
///
/// The map itself sits behind a short-lived synchronous lock; each entry has
/// its own async lock held for the whole refresh-then-read, so refreshes of
/// one file never interleave while different files proceed in parallel.
#[derive(Debug)]
pub struct LogCache {
    entries: Mutex<HashMap<PathBuf, SharedEntry>>,
    max_lines: usize,
    initial_scan_bytes: u64,
    scans: AtomicU64,
}

impl LogCache {
    /// Create a cache with the given line cap and first-scan byte budget.
    #[must_use]
    pub fn new(max_lines: usize, initial_scan_bytes: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_lines: max_lines.max(1),
            initial_scan_bytes: initial_scan_bytes.max(1),
            scans: AtomicU64::new(0),
        }
    }

    /// Bring the entry for `path` up to date and return its most recent
    /// `tail` lines.
    ///
    /// A missing file yields an empty result and drops any entry left from
    /// before it disappeared.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read and no earlier snapshot of
    /// it is available.
    ///
    /// # Panics
    ///
    /// Panics if the internal map lock is poisoned.
    pub async fn refresh(
        &self,
        path: &Path,
        tz_offset: i32,
        tail: usize,
    ) -> Result<CachedLines, LogError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.invalidate(path);
                return Ok(CachedLines::missing());
            }
            Err(e) => return Err(LogError::from_io(path, e)),
        };
        let size = metadata.len();
        let modified = metadata.modified().ok();

        let shared = self.entry(path);
        let mut entry = shared.lock().await;

        if entry.is_fresh(size, modified, tz_offset) {
            entry.last_access = Instant::now();
            return Ok(entry.view(tail));
        }

        if entry.tz_offset.is_some_and(|rendered| rendered != tz_offset) {
            tracing::debug!(
                path = %path.display(),
                old_offset = entry.tz_offset,
                new_offset = tz_offset,
                "Timezone changed, re-rendering cached lines"
            );
            entry.clear();
        }

        let truncated = size < entry.last_read_offset;
        if truncated {
            tracing::debug!(
                path = %path.display(),
                old_offset = entry.last_read_offset,
                new_len = size,
                "Log file shrank, dropping cached lines"
            );
            entry.clear();
        }

        match self.scan(path, entry.last_read_offset, size, tz_offset).await {
            Ok(Some((rendered, end_offset))) => {
                entry.lines.extend(rendered);
                let overflow = entry.lines.len().saturating_sub(self.max_lines);
                entry.lines.drain(..overflow);

                entry.last_read_offset = end_offset;
                entry.tz_offset = Some(tz_offset);
                entry.last_size = Some(size.max(end_offset));
                // Grew while scanning: the recorded stamp is older than the
                // bytes read, so force a re-check next time.
                entry.last_modified = if end_offset > size { None } else { modified };
                entry.last_access = Instant::now();
                Ok(entry.view(tail))
            }
            Ok(None) => {
                entry.clear();
                Ok(CachedLines::missing())
            }
            Err(e) if !truncated && entry.tz_offset == Some(tz_offset) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Log refresh failed, serving previous snapshot"
                );
                entry.last_access = Instant::now();
                Ok(entry.view(tail))
            }
            Err(e) => Err(e),
        }
    }

    /// Read and render everything after `offset`.
    async fn scan(
        &self,
        path: &Path,
        offset: u64,
        size: u64,
        tz_offset: i32,
    ) -> Result<Option<(Vec<String>, u64)>, LogError> {
        self.scans.fetch_add(1, Ordering::Relaxed);

        let mut start = offset;
        if start == 0 && size > self.initial_scan_bytes {
            match next_line_start(path, size - self.initial_scan_bytes).await? {
                Some(boundary) => start = boundary,
                None => return Ok(None),
            }
        }

        let Some(chunk) = read_lines_from(path, start, None).await? else {
            return Ok(None);
        };

        let rendered = chunk
            .lines
            .iter()
            .map(|raw| render_line(raw, tz_offset))
            .filter(|line| !line.is_empty())
            .collect();
        Ok(Some((rendered, chunk.end_offset)))
    }

    /// Drop the entry for `path`.
    ///
    /// # Panics
    ///
    /// Panics if the internal map lock is poisoned.
    pub fn invalidate(&self, path: &Path) {
        if self.entries().remove(path).is_some() {
            tracing::debug!(path = %path.display(), "Log cache entry invalidated");
        }
    }

    /// Drop every entry, e.g. after the timezone offset changed.
    ///
    /// # Panics
    ///
    /// Panics if the internal map lock is poisoned.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries();
        let dropped = entries.len();
        entries.clear();
        tracing::debug!(dropped, "Log cache cleared");
    }

    /// Evict entries not read for longer than `ttl`. Entries that are being
    /// refreshed right now are kept.
    ///
    /// Returns the number of evicted entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal map lock is poisoned.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| match entry.try_lock() {
            Ok(entry) => entry.last_access.elapsed() <= ttl,
            Err(_) => true,
        });
        before - entries.len()
    }

    /// Current counters.
    ///
    /// # Panics
    ///
    /// Panics if the internal map lock is poisoned.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries().len(),
            scans: self.scans.load(Ordering::Relaxed),
        }
    }

    fn entry(&self, path: &Path) -> SharedEntry {
        let mut entries = self.entries();
        Arc::clone(
            entries
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(CacheEntry::new()))),
        )
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, SharedEntry>> {
        self.entries.lock().expect("log cache lock poisoned")
    }
}

impl Default for LogCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHED_LINES, DEFAULT_INITIAL_SCAN_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_creates_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LogCache::default();

        let result = cache
            .refresh(&dir.path().join("error.log"), 0, usize::MAX)
            .await
            .unwrap();

        assert!(!result.exists);
        assert!(result.lines.is_empty());
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_unchanged_file_is_a_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        append(&path, "2024/01/01 10:00:00 [Info] a\n");
        let cache = LogCache::default();

        let first = cache.refresh(&path, 0, usize::MAX).await.unwrap();
        let scans_after_first = cache.stats().scans;
        let second = cache.refresh(&path, 0, usize::MAX).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.stats().scans, scans_after_first);
        assert_eq!(first.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_incremental_refresh_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        append(&path, "one\n");
        let cache = LogCache::default();

        let first = cache.refresh(&path, 0, usize::MAX).await.unwrap();
        assert_eq!(first.lines.len(), 1);
        assert_eq!(first.offset, 4);

        append(&path, "two\nthree\n");
        let second = cache.refresh(&path, 0, usize::MAX).await.unwrap();
        assert_eq!(second.lines.len(), 3);
        assert!(second.lines[2].contains("three"));
        assert_eq!(second.offset, 14);
    }

    #[tokio::test]
    async fn test_truncation_resets_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        append(&path, "old line one\nold line two\n");
        let cache = LogCache::default();
        cache.refresh(&path, 0, usize::MAX).await.unwrap();

        std::fs::write(&path, "new\n").unwrap();
        let result = cache.refresh(&path, 0, usize::MAX).await.unwrap();

        assert_eq!(result.lines.len(), 1);
        assert!(result.lines[0].contains("new"));
        assert_eq!(result.offset, 4);
    }

    #[tokio::test]
    async fn test_recreated_file_is_read_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        append(&path, "old1\nold2\n");
        let cache = LogCache::default();
        cache.refresh(&path, 0, usize::MAX).await.unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(!cache.refresh(&path, 0, usize::MAX).await.unwrap().exists);
        assert_eq!(cache.stats().entries, 0);

        append(&path, "new-line-1\nnew-line-2\n");
        let result = cache.refresh(&path, 0, usize::MAX).await.unwrap();
        assert_eq!(result.lines.len(), 2);
        assert!(result.lines[0].contains("new-line-1"));
        assert!(result.lines[1].contains("new-line-2"));
    }

    #[tokio::test]
    async fn test_line_cap_keeps_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let mut text = String::new();
        for i in 0..6000 {
            text.push_str(&format!("line {i}\n"));
        }
        append(&path, &text);
        let cache = LogCache::default();

        let result = cache.refresh(&path, 0, usize::MAX).await.unwrap();

        assert_eq!(result.total, DEFAULT_MAX_CACHED_LINES);
        assert_eq!(result.lines.len(), DEFAULT_MAX_CACHED_LINES);
        assert!(result.lines[0].contains("line 1000<"));
        assert!(result.lines[4999].contains("line 5999<"));
    }

    #[tokio::test]
    async fn test_tail_bound_limits_returned_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        append(&path, "a\nb\nc\nd\n");
        let cache = LogCache::default();

        let result = cache.refresh(&path, 0, 2).await.unwrap();
        assert_eq!(result.total, 4);
        assert_eq!(result.lines.len(), 2);
        assert!(result.lines[0].contains(">c<"));
    }

    #[tokio::test]
    async fn test_large_file_reads_only_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        let mut text = String::new();
        for i in 0..100 {
            text.push_str(&format!("entry {i:03}\n"));
        }
        append(&path, &text);
        // 10 bytes per line, budget for the last 5 lines plus a partial one.
        let cache = LogCache::new(DEFAULT_MAX_CACHED_LINES, 55);

        let result = cache.refresh(&path, 0, usize::MAX).await.unwrap();
        assert_eq!(result.lines.len(), 5);
        assert!(result.lines[0].contains("entry 095"));
        assert_eq!(result.offset, 1000);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rerender() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        append(&path, "2024/01/01 10:00:00 [Info] x\n");
        let cache = LogCache::default();

        let before = cache.refresh(&path, 0, usize::MAX).await.unwrap();
        assert!(before.lines[0].contains("10:00:00"));

        cache.invalidate_all();
        let after = cache.refresh(&path, 2, usize::MAX).await.unwrap();
        assert!(after.lines[0].contains("12:00:00"));
    }

    #[tokio::test]
    async fn test_offset_change_rerenders_without_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        append(&path, "2024/01/01 10:00:00 [Info] x\n");
        let cache = LogCache::default();

        let before = cache.refresh(&path, 0, usize::MAX).await.unwrap();
        assert!(before.lines[0].contains("10:00:00"));

        let after = cache.refresh(&path, 5, usize::MAX).await.unwrap();
        assert_eq!(after.lines.len(), 1);
        assert!(after.lines[0].contains("15:00:00"));
        assert_eq!(after.offset, before.offset);
    }

    #[tokio::test]
    async fn test_invalidate_single_path() {
        let dir = tempfile::tempdir().unwrap();
        let error = dir.path().join("error.log");
        let access = dir.path().join("access.log");
        append(&error, "e\n");
        append(&access, "a\n");
        let cache = LogCache::default();
        cache.refresh(&error, 0, usize::MAX).await.unwrap();
        cache.refresh(&access, 0, usize::MAX).await.unwrap();

        cache.invalidate(&error);
        assert_eq!(cache.stats().entries, 1);
    }

    #[tokio::test]
    async fn test_evict_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        append(&path, "x\n");
        let cache = LogCache::default();
        cache.refresh(&path, 0, usize::MAX).await.unwrap();

        assert_eq!(cache.evict_idle(Duration::from_secs(600)), 0);
        assert_eq!(cache.stats().entries, 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.evict_idle(Duration::ZERO), 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_blank_lines_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        append(&path, "a\n\n   \nb\n");
        let cache = LogCache::default();

        let result = cache.refresh(&path, 0, usize::MAX).await.unwrap();
        assert_eq!(result.lines.len(), 2);
    }
}
