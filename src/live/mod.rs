//! Live log streaming over WebSocket.

mod error;
mod protocol;
mod session;
mod socket;

pub use error::SessionError;
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{SessionOptions, TailSession, DEFAULT_MAX_APPEND_BYTES, DEFAULT_POLL_INTERVAL};
pub use socket::{
    serve_socket, SocketOptions, DEFAULT_HEARTBEAT, DEFAULT_IDLE_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
};
