//! Log subsystem error types.

use std::path::PathBuf;

/// Errors that can occur while reading, tailing or clearing log files.
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    /// Permission denied accessing the log file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// I/O error on a specific log file.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File change notifier error.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl LogError {
    /// Classify an I/O error raised while touching `path`.
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied(path)
        } else {
            Self::Io { path, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_display() {
        let err = LogError::PermissionDenied(PathBuf::from("/opt/var/log/xray/error.log"));
        assert_eq!(
            err.to_string(),
            "Permission denied: /opt/var/log/xray/error.log"
        );
    }

    #[test]
    fn test_from_io_classifies_permission() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = LogError::from_io("/tmp/a.log", io_err);
        assert!(matches!(err, LogError::PermissionDenied(_)));
    }

    #[test]
    fn test_from_io_keeps_other_errors() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = LogError::from_io("/tmp/a.log", io_err);
        assert!(matches!(err, LogError::Io { .. }));
        assert!(err.to_string().contains("I/O error on /tmp/a.log"));
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_from_notify_error() {
        let err: LogError = notify::Error::generic("watch limit").into();
        assert!(matches!(err, LogError::Watch(_)));
        assert!(err.to_string().contains("File watcher error"));
    }
}
