//! Proxy core log access: tailing, caching, rendering and filtering.

mod cache;
mod error;
mod file;
mod janitor;
mod reader;
mod render;
mod tailer;
mod watch;

pub use cache::{
    CacheStats, CachedLines, LogCache, DEFAULT_INITIAL_SCAN_BYTES, DEFAULT_MAX_CACHED_LINES,
};
pub use error::LogError;
pub use file::{LogFile, LogPaths, DEFAULT_ACCESS_LOG, DEFAULT_ERROR_LOG};
pub use janitor::{spawn_janitor, DEFAULT_CACHE_TTL, DEFAULT_JANITOR_INTERVAL};
pub use reader::{
    parse_query, LogReader, ReaderLimits, DEFAULT_FILTER_MAX_BYTES, DEFAULT_SNAPSHOT_LINES,
};
pub use render::{normalize_levels, render_line, shift_timestamps};
pub use tailer::{
    for_each_line, next_line_start, read_lines_from, LineChunk, LogTailer, ScanEnd, TailEvent,
    MAX_LINE_BYTES,
};
pub use watch::FileWatcher;
