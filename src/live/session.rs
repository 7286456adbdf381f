//! Live tail session state machine.
//!
//! A session owns one [`LogTailer`] and reacts to three sources: control
//! messages from the client, a poll ticker and file-change notifications.
//! Everything it produces goes out through a single event channel, so the
//! transport never needs to know about files.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::error::SessionError;
use super::protocol::{ClientMessage, ServerMessage};
use crate::logs::{FileWatcher, LogFile, LogReader, LogTailer, TailEvent};

/// Default interval between file polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default cap on bytes read for a single append.
pub const DEFAULT_MAX_APPEND_BYTES: u64 = 256 * 1024;

/// Tuning for a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Interval between file polls.
    pub poll_interval: Duration,
    /// Bytes read per poll at most; the rest follows on later polls.
    pub max_append_bytes: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_append_bytes: DEFAULT_MAX_APPEND_BYTES,
        }
    }
}

/// One client's view of a log file.
#[derive(Debug)]
pub struct TailSession {
    reader: Arc<LogReader>,
    file: LogFile,
    tailer: LogTailer,
    options: SessionOptions,
    filter_task: Option<JoinHandle<()>>,
}

impl TailSession {
    /// Create a session following `file`.
    #[must_use]
    pub fn new(reader: Arc<LogReader>, file: LogFile, options: SessionOptions) -> Self {
        let tailer = LogTailer::new(reader.path(file).to_path_buf(), options.max_append_bytes);
        Self {
            reader,
            file,
            tailer,
            options,
            filter_task: None,
        }
    }

    /// Send the initial snapshot, then stream until `cancel` fires, the
    /// command channel closes or the event channel is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ChannelClosed` if events can no longer be
    /// delivered.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<ClientMessage>,
        events: mpsc::Sender<ServerMessage>,
        cancel: CancellationToken,
    ) -> Result<(), SessionError> {
        let result = self.stream(&mut commands, &events, &cancel).await;
        if let Some(task) = self.filter_task.take() {
            task.abort();
        }
        result
    }

    async fn stream(
        &mut self,
        commands: &mut mpsc::Receiver<ClientMessage>,
        events: &mpsc::Sender<ServerMessage>,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.send_initial(events).await?;

        let mut watch = self.watch();
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                command = commands.recv() => {
                    let Some(command) = command else {
                        return Ok(());
                    };
                    let before = self.file;
                    self.handle_command(command, events).await?;
                    if self.file != before {
                        watch = self.watch();
                    }
                }
                _ = ticker.tick() => self.tick(events).await?,
                changed = next_change(&mut watch) => match changed {
                    Some(()) => self.tick(events).await?,
                    None => watch = None,
                },
            }
        }
    }

    async fn handle_command(
        &mut self,
        command: ClientMessage,
        events: &mpsc::Sender<ServerMessage>,
    ) -> Result<(), SessionError> {
        tracing::debug!(file = %self.file, ?command, "Session command");
        match command {
            ClientMessage::Filter { query } => {
                self.spawn_filter(query, events.clone());
                Ok(())
            }
            ClientMessage::SwitchFile { file } => {
                self.abort_filter();
                self.file = LogFile::from_selector(&file);
                self.tailer
                    .retarget(self.reader.path(self.file).to_path_buf());
                self.send_initial(events).await
            }
            ClientMessage::Reload => {
                self.abort_filter();
                self.reader.invalidate(self.file);
                self.tailer.reset();
                self.send_initial(events).await
            }
            ClientMessage::Clear => match self.reader.clear(self.file).await {
                Ok(()) => {
                    self.tailer.reset();
                    send(events, ServerMessage::Clear).await
                }
                Err(e) => {
                    tracing::warn!(file = %self.file, error = %e, "Failed to clear log");
                    send(
                        events,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await
                }
            },
        }
    }

    async fn tick(&mut self, events: &mpsc::Sender<ServerMessage>) -> Result<(), SessionError> {
        match self.tailer.poll().await {
            Ok(TailEvent::Unchanged) => Ok(()),
            Ok(TailEvent::Appended(raw)) => {
                let rendered = self.reader.render(&raw);
                if rendered.is_empty() {
                    return Ok(());
                }
                send(
                    events,
                    ServerMessage::Append {
                        content: rendered.join("\n"),
                    },
                )
                .await
            }
            Ok(TailEvent::Truncated) => {
                // Content before the cut may have been rewritten with the
                // same size, so the cached rendering cannot be trusted.
                self.reader.invalidate(self.file);
                send(events, ServerMessage::Clear).await?;
                self.send_initial(events).await
            }
            Ok(TailEvent::Vanished) => {
                // A file recreated in its place starts from zero.
                self.reader.invalidate(self.file);
                send(events, ServerMessage::Clear).await
            }
            Err(e) => {
                tracing::warn!(file = %self.file, error = %e, "Log poll failed");
                Ok(())
            }
        }
    }

    /// Send the snapshot of the current file and continue tailing exactly
    /// where it ends.
    async fn send_initial(&mut self, events: &mpsc::Sender<ServerMessage>) -> Result<(), SessionError> {
        match self.reader.snapshot(self.file).await {
            Ok(snapshot) => {
                self.tailer.resume_at(snapshot.offset, snapshot.exists);
                send(
                    events,
                    ServerMessage::Initial {
                        lines: snapshot.lines,
                        total: snapshot.total,
                        file: self.file,
                    },
                )
                .await
            }
            Err(e) => {
                tracing::warn!(file = %self.file, error = %e, "Failed to read log snapshot");
                self.tailer.resume_at(0, false);
                send(
                    events,
                    ServerMessage::Error {
                        message: e.to_string(),
                    },
                )
                .await
            }
        }
    }

    fn spawn_filter(&mut self, query: String, events: mpsc::Sender<ServerMessage>) {
        self.abort_filter();
        let reader = Arc::clone(&self.reader);
        let file = self.file;
        self.filter_task = Some(tokio::spawn(async move {
            let message = match reader.read_filtered(file, &query).await {
                Ok(lines) => ServerMessage::Filtered { lines },
                Err(e) => {
                    tracing::warn!(file = %file, error = %e, "Filter failed");
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }
            };
            let _ = events.send(message).await;
        }));
    }

    fn abort_filter(&mut self) {
        if let Some(task) = self.filter_task.take() {
            task.abort();
        }
    }

    fn watch(&self) -> Watch {
        match FileWatcher::new(self.tailer.path()) {
            Ok(watch) => Some(watch),
            Err(e) => {
                tracing::debug!(
                    path = %self.tailer.path().display(),
                    error = %e,
                    "File watcher unavailable, polling only"
                );
                None
            }
        }
    }
}

type Watch = Option<(FileWatcher, mpsc::UnboundedReceiver<()>)>;

async fn next_change(watch: &mut Watch) -> Option<()> {
    match watch {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send(
    events: &mpsc::Sender<ServerMessage>,
    message: ServerMessage,
) -> Result<(), SessionError> {
    events
        .send(message)
        .await
        .map_err(|_| SessionError::ChannelClosed)
}
