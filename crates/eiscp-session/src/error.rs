use std::time::Duration;

use eiscp_frame::{CommandCode, FrameError};
use eiscp_transport::TransportError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Dialing, re-dialing or talking to the socket failed.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// Frame-level error (malformed frame, unsupported version, bad argument).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A command was attempted with no live socket.
    #[error("not connected")]
    NotConnected,

    /// No matching reply arrived before the deadline.
    #[error("no reply to {command} within {timeout:?}")]
    Timeout {
        command: CommandCode,
        timeout: Duration,
    },

    /// Strict correlation saw too many unrelated replies.
    #[error("gave up waiting for {command} after {mismatches} unrelated replies")]
    TooManyMismatches {
        command: CommandCode,
        mismatches: usize,
    },

    /// Zero frames arrived where exactly one was required.
    #[error("no reply to {0}")]
    NoReply(CommandCode),

    /// The persistent session has been shut down.
    #[error("session closed")]
    Closed,

    /// No decoder is registered for the command code.
    #[error("no decoder registered for {0}")]
    NoDecoder(CommandCode),

    /// A registered decoder rejected the reply.
    #[error("cannot decode {command} reply: {message}")]
    Decode {
        command: CommandCode,
        message: String,
    },
}

impl SessionError {
    /// Map a failed socket operation, read or write, onto the session taxonomy.
    pub(crate) fn from_io(err: FrameError) -> Self {
        match err {
            FrameError::Io(io) => SessionError::Connection(TransportError::Io(io)),
            FrameError::ConnectionClosed => SessionError::Connection(TransportError::Shutdown),
            other => SessionError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
