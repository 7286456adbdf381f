//! Incremental log file tailer.
//!
//! Reads complete lines appended to a log file since the last read and
//! detects truncation, rotation and deletion.

use std::io::SeekFrom;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};

use super::error::LogError;

/// Longest line kept in memory; anything past it is skipped.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Complete lines read from a region of a log file.
#[derive(Debug, Default)]
pub struct LineChunk {
    /// Raw lines without their line terminators.
    pub lines: Vec<String>,
    /// Offset just past the last complete line consumed.
    pub end_offset: u64,
    /// Whether reading stopped at end of file rather than at the byte limit.
    pub exhausted: bool,
}

/// Where a line scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanEnd {
    /// Offset just past the last complete line visited.
    pub end_offset: u64,
    /// Whether the scan reached end of file (or a trailing partial line)
    /// rather than being stopped by the visitor.
    pub exhausted: bool,
}

/// Visit each complete line starting at `offset`.
///
/// The visitor receives the line without its terminator and the offset just
/// past it, and may stop the scan early. A trailing line without a newline
/// is left unread so it is never seen half-written. Lines longer than
/// [`MAX_LINE_BYTES`] are cut to that length. Returns `Ok(None)` when the
/// file does not exist.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub async fn for_each_line<F>(
    path: &Path,
    offset: u64,
    mut visit: F,
) -> Result<Option<ScanEnd>, LogError>
where
    F: FnMut(&str, u64) -> ControlFlow<()>,
{
    let Some(mut file) = open_existing(path).await? else {
        return Ok(None);
    };
    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|e| LogError::from_io(path, e))?;

    let mut reader = BufReader::new(file);
    let mut end = ScanEnd {
        end_offset: offset,
        exhausted: false,
    };
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let mut bytes_read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| LogError::from_io(path, e))?;

        if buf.last() != Some(&b'\n') {
            if bytes_read < MAX_LINE_BYTES {
                end.exhausted = true;
                break;
            }
            let Some(skipped) = skip_line(&mut reader)
                .await
                .map_err(|e| LogError::from_io(path, e))?
            else {
                end.exhausted = true;
                break;
            };
            tracing::debug!(
                path = %path.display(),
                length = bytes_read + skipped,
                "Overlong log line cut"
            );
            bytes_read += skipped;
        }

        end.end_offset += bytes_read as u64;
        let line = String::from_utf8_lossy(&buf);
        if visit(line.trim_end_matches(['\r', '\n']), end.end_offset).is_break() {
            break;
        }
    }

    Ok(Some(end))
}

/// Consume the rest of the current line without buffering it. Returns the
/// number of bytes consumed including the newline, or `None` if the file
/// ended first.
async fn skip_line<R>(reader: &mut R) -> std::io::Result<Option<usize>>
where
    R: AsyncBufRead + Unpin,
{
    let mut skipped = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(None);
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            reader.consume(pos + 1);
            return Ok(Some(skipped + pos + 1));
        }
        let len = available.len();
        reader.consume(len);
        skipped += len;
    }
}

/// Read complete lines starting at `offset`.
///
/// Reading stops after `max_bytes` have been consumed, at a line boundary.
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub async fn read_lines_from(
    path: &Path,
    offset: u64,
    max_bytes: Option<u64>,
) -> Result<Option<LineChunk>, LogError> {
    let mut lines = Vec::new();
    let end = for_each_line(path, offset, |line, end_offset| {
        lines.push(line.to_string());
        if max_bytes.is_some_and(|max| end_offset - offset >= max) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .await?;

    Ok(end.map(|end| LineChunk {
        lines,
        end_offset: end.end_offset,
        exhausted: end.exhausted,
    }))
}

/// Find the first line boundary at or after `start`.
///
/// Used when reading only the tail of a large file: the partial line the
/// seek lands in is skipped. Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub async fn next_line_start(path: &Path, start: u64) -> Result<Option<u64>, LogError> {
    if start == 0 {
        return Ok(Some(0));
    }
    let Some(mut file) = open_existing(path).await? else {
        return Ok(None);
    };
    // Start one byte early so a seek that lands exactly on a line start
    // keeps that line.
    let probe = start - 1;
    file.seek(SeekFrom::Start(probe))
        .await
        .map_err(|e| LogError::from_io(path, e))?;

    let mut reader = BufReader::new(file);
    let mut discarded = Vec::new();
    let skipped = reader
        .read_until(b'\n', &mut discarded)
        .await
        .map_err(|e| LogError::from_io(path, e))?;
    Ok(Some(probe + skipped as u64))
}

async fn open_existing(path: &Path) -> Result<Option<File>, LogError> {
    match File::open(path).await {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LogError::from_io(path, e)),
    }
}

/// Outcome of one [`LogTailer::poll`].
#[derive(Debug, PartialEq, Eq)]
pub enum TailEvent {
    /// Nothing new since the last poll.
    Unchanged,
    /// New complete lines, in file order.
    Appended(Vec<String>),
    /// The file shrank below the consumed offset; the offset is back at 0.
    Truncated,
    /// The file disappeared; the offset is back at 0.
    Vanished,
}

/// Incremental log reader that tracks its own read position.
///
/// Every poll opens the file, reads at most `max_chunk` bytes of new complete
/// lines and closes it again, so no handle outlives a single call.
#[derive(Debug)]
pub struct LogTailer {
    /// Path to the log file.
    path: PathBuf,
    /// Byte offset already consumed.
    offset: u64,
    /// File length at which everything available was consumed.
    caught_up_len: Option<u64>,
    /// Whether the file existed at the last observation.
    present: bool,
    /// Upper bound on bytes read per poll.
    max_chunk: u64,
}

impl LogTailer {
    /// Create a tailer starting at the beginning of the file.
    #[must_use]
    pub fn new(path: PathBuf, max_chunk: u64) -> Self {
        Self {
            path,
            offset: 0,
            caught_up_len: None,
            present: false,
            max_chunk: max_chunk.max(1),
        }
    }

    /// Get the current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the path being tailed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Continue from `offset`, e.g. after a snapshot covering everything
    /// before it was delivered.
    pub fn resume_at(&mut self, offset: u64, present: bool) {
        self.offset = offset;
        self.present = present;
        self.caught_up_len = None;
    }

    /// Switch to another file, starting from its beginning.
    pub fn retarget(&mut self, path: PathBuf) {
        self.path = path;
        self.reset();
    }

    /// Reset the offset to the beginning of the file.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.caught_up_len = None;
    }

    /// Check the file and read whatever complete lines were appended.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures other than the file being absent;
    /// the tailer state is unchanged in that case.
    pub async fn poll(&mut self) -> Result<TailEvent, LogError> {
        let len = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(self.mark_missing()),
            Err(e) => return Err(LogError::from_io(&self.path, e)),
        };
        self.present = true;

        if len < self.offset {
            tracing::debug!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = len,
                "Log file truncated, resetting offset to 0"
            );
            self.reset();
            return Ok(TailEvent::Truncated);
        }

        if len == self.offset || self.caught_up_len == Some(len) {
            self.caught_up_len = Some(len);
            return Ok(TailEvent::Unchanged);
        }

        let Some(chunk) = read_lines_from(&self.path, self.offset, Some(self.max_chunk)).await?
        else {
            return Ok(self.mark_missing());
        };

        self.offset = chunk.end_offset;
        self.caught_up_len = chunk.exhausted.then_some(len);

        if chunk.lines.is_empty() {
            Ok(TailEvent::Unchanged)
        } else {
            Ok(TailEvent::Appended(chunk.lines))
        }
    }

    fn mark_missing(&mut self) -> TailEvent {
        let was_present = std::mem::replace(&mut self.present, false);
        self.reset();
        if was_present {
            tracing::debug!(path = %self.path.display(), "Log file disappeared");
            TailEvent::Vanished
        } else {
            TailEvent::Unchanged
        }
    }
}
