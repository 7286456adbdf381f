//! File change notifications for a single log file.
//!
//! The parent directory is watched rather than the file itself so that
//! creation, deletion and rotation of the log are observed as well.

use std::path::{Path, PathBuf};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::LogError;

/// Watches one log file and signals whenever it may have changed.
///
/// Signals carry no payload: the receiver is expected to re-check the file,
/// so spurious wakeups are harmless. Dropping the watcher stops it.
pub struct FileWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Start watching `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be watched, e.g.
    /// because it does not exist.
    pub fn new(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<()>), LogError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let target = path.to_path_buf();
        let file_name = path.file_name().map(std::ffi::OsStr::to_os_string);

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    let touches_target = event.paths.iter().any(|p| {
                        p == &target || (file_name.is_some() && p.file_name() == file_name.as_deref())
                    });
                    if touches_target {
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Log watcher error");
                    let _ = tx.send(());
                }
            }
        })?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %path.display(), "Watching log file");

        Ok((
            Self {
                path: path.to_path_buf(),
                _watcher: watcher,
            },
            rx,
        ))
    }
}
