//! JSON messages exchanged over the live channel.

use serde::{Deserialize, Serialize};

use crate::logs::LogFile;

/// Control message sent by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Show only lines matching any `|`-separated keyword.
    Filter {
        #[serde(default)]
        query: String,
    },
    /// Follow another log file from its current snapshot.
    SwitchFile { file: String },
    /// Re-read the current file and resend the snapshot.
    Reload,
    /// Truncate the current file.
    Clear,
}

/// Message pushed to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Snapshot of the selected file.
    Initial {
        lines: Vec<String>,
        total: usize,
        file: LogFile,
    },
    /// Result of a filter request.
    Filtered { lines: Vec<String> },
    /// Newly appended lines, rendered and joined with `\n`.
    Append { content: String },
    /// The file was truncated, rotated or removed.
    Clear,
    /// A command failed; the session stays open.
    Error { message: String },
}
