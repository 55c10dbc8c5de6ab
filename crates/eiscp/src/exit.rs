use std::fmt;
use std::io;

use eiscp_frame::FrameError;
use eiscp_session::SessionError;
use eiscp_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::InvalidAddress { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Connect { ref source, .. } if source.kind() == io::ErrorKind::TimedOut => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        TransportError::Connect { .. } | TransportError::Shutdown => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidCommandCode(_) | FrameError::InvalidArgument(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        FrameError::Malformed(_) | FrameError::UnsupportedVersion(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::TimedOut => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Connection(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::NotConnected => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        SessionError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        SessionError::Timeout { .. } | SessionError::NoReply(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        SessionError::TooManyMismatches { .. } | SessionError::Decode { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::NoDecoder(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::time::Duration;

    use eiscp_frame::CommandCode;

    use super::*;

    const PWR: CommandCode = CommandCode::from_static(b"PWR");

    #[test]
    fn session_errors_map_to_exit_codes() {
        let cases = [
            (SessionError::NoReply(PWR), TIMEOUT),
            (
                SessionError::Timeout {
                    command: PWR,
                    timeout: Duration::from_secs(3),
                },
                TIMEOUT,
            ),
            (
                SessionError::TooManyMismatches {
                    command: PWR,
                    mismatches: 6,
                },
                DATA_INVALID,
            ),
            (SessionError::NotConnected, TRANSPORT_ERROR),
            (
                SessionError::Frame(FrameError::InvalidArgument("\r".into())),
                USAGE,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(session_error("request failed", err).code, code);
        }
    }

    #[test]
    fn refused_connect_is_transport_error() {
        let err = TransportError::Connect {
            addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 60128),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let cli = transport_error("connect failed", err);
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.starts_with("connect failed: "));
    }

    #[test]
    fn invalid_host_is_usage_error() {
        let err = TransportError::InvalidAddress {
            host: "receiver.local".into(),
        };
        assert_eq!(transport_error("connect failed", err).code, USAGE);
    }
}
