//! Live session error types.

/// Errors that end a live tail session.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// Client sent a frame that is not a valid control message.
    #[error("Malformed client message: {0}")]
    Protocol(#[source] serde_json::Error),

    /// The underlying connection failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No frame arrived from the client within the idle deadline.
    #[error("Client idle for longer than {0:?}")]
    IdleTimeout(std::time::Duration),

    /// A send did not complete within the write deadline.
    #[error("Write timed out after {0:?}")]
    WriteTimeout(std::time::Duration),

    /// The peer side of an internal channel went away.
    #[error("Session channel closed")]
    ChannelClosed,

    /// Failed to encode an outgoing message.
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}
