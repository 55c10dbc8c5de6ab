/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The bytes do not form a structurally valid eISCP frame.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    /// The header declares a protocol version other than 1.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// A command code was not exactly 3 printable ASCII characters.
    #[error("invalid command code {0:?} (expected 3 printable ASCII characters)")]
    InvalidCommandCode(String),

    /// An argument contained non-ASCII or control characters.
    #[error("invalid argument {0:?} (expected printable ASCII)")]
    InvalidArgument(String),

    /// The socket read or write deadline passed.
    #[error("socket operation timed out")]
    TimedOut,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for failures that describe a bad frame rather than a bad stream.
    ///
    /// Structural failures leave the connection usable; the offending bytes
    /// are skipped and reading can continue.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            FrameError::Malformed(_)
                | FrameError::UnsupportedVersion(_)
                | FrameError::InvalidCommandCode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
