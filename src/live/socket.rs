//! WebSocket transport for live tail sessions.
//!
//! Each connection runs three tasks sharing one cancellation token: a read
//! pump decoding client frames, a write pump encoding server messages, and
//! the [`TailSession`] itself. Whichever ends first takes the others down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::SessionError;
use super::protocol::{ClientMessage, ServerMessage};
use super::session::{SessionOptions, TailSession};
use crate::logs::{LogFile, LogReader};

/// Default time a client may stay silent before the session is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default deadline for a single outgoing frame.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between keep-alive pings.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 64;

/// Connection-level tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketOptions {
    /// Session behaviour.
    pub session: SessionOptions,
    /// Maximum silence from the client, pongs included.
    pub idle_timeout: Duration,
    /// Deadline for each outgoing frame.
    pub write_timeout: Duration,
    /// Interval between pings.
    pub heartbeat: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            session: SessionOptions::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }
}

/// Counts open sessions for as long as it lives.
struct OpenSession(Arc<AtomicUsize>);

impl OpenSession {
    fn enter(counter: Arc<AtomicUsize>) -> (Self, usize) {
        let open = counter.fetch_add(1, Ordering::SeqCst) + 1;
        (Self(counter), open)
    }
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serve one upgraded WebSocket until either side closes or `shutdown`
/// fires.
pub async fn serve_socket(
    socket: WebSocket,
    reader: Arc<LogReader>,
    file: LogFile,
    options: SocketOptions,
    shutdown: CancellationToken,
    open_sessions: Arc<AtomicUsize>,
) {
    let session_id = Uuid::new_v4();
    let (_open, open) = OpenSession::enter(open_sessions);
    tracing::info!(session_id = %session_id, file = %file, open, "Live session opened");

    let cancel = shutdown.child_token();
    let (sink, stream) = socket.split();
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

    let read = tokio::spawn(read_pump(
        stream,
        command_tx,
        options.idle_timeout,
        cancel.clone(),
    ));
    let write = tokio::spawn(write_pump(
        sink,
        event_rx,
        options.write_timeout,
        options.heartbeat,
        cancel.clone(),
    ));

    let session = TailSession::new(reader, file, options.session);
    let session_result = session.run(command_rx, event_tx, cancel.clone()).await;
    cancel.cancel();

    let mut reason = session_result.err();
    for pump in [read, write] {
        match pump.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                reason.get_or_insert(e);
            }
            Err(e) => tracing::warn!(session_id = %session_id, error = %e, "Session task failed"),
        }
    }

    match reason {
        Some(e) => {
            tracing::info!(session_id = %session_id, reason = %e, "Live session closed");
        }
        None => tracing::info!(session_id = %session_id, "Live session closed"),
    }
}

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    commands: mpsc::Sender<ClientMessage>,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    let _guard = cancel.clone().drop_guard();
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            frame = tokio::time::timeout(idle_timeout, stream.next()) => frame,
        };
        let message = match frame {
            Err(_) => return Err(SessionError::IdleTimeout(idle_timeout)),
            Ok(None) | Ok(Some(Ok(Message::Close(_)))) => return Ok(()),
            Ok(Some(Err(e))) => return Err(SessionError::Transport(e.to_string())),
            Ok(Some(Ok(Message::Text(text)))) => {
                serde_json::from_str::<ClientMessage>(&text).map_err(SessionError::Protocol)?
            }
            Ok(Some(Ok(Message::Binary(data)))) => {
                serde_json::from_slice::<ClientMessage>(&data).map_err(SessionError::Protocol)?
            }
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
        };
        if commands.send(message).await.is_err() {
            return Ok(());
        }
    }
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut events: mpsc::Receiver<ServerMessage>,
    write_timeout: Duration,
    heartbeat: Duration,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    let _guard = cancel.clone().drop_guard();
    let mut ping = tokio::time::interval(heartbeat);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping.tick().await;

    let result = loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break Ok(()),
            event = events.recv() => match event {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => break Err(SessionError::Encode(e)),
                },
                None => break Ok(()),
            },
            _ = ping.tick() => Message::Ping(Vec::new().into()),
        };
        match tokio::time::timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => break Err(SessionError::Transport(e.to_string())),
            Err(_) => break Err(SessionError::WriteTimeout(write_timeout)),
        }
    };

    let _ = tokio::time::timeout(write_timeout, sink.close()).await;
    result
}
