use std::time::Duration;

use clap::{Args, Subcommand};
use eiscp_frame::CommandCode;
use eiscp_session::SessionConfig;
use eiscp_transport::DEFAULT_PORT;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod query;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command, optionally collecting the replies.
    Send(SendArgs),
    /// Ask the device for the current value of a command.
    Query(QueryArgs),
    /// Stay connected and print every frame the device sends.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Query(args) => query::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Receiver IPv4 address.
    #[arg(long, env = "EISCP_HOST")]
    pub host: String,
    /// Receiver TCP port.
    #[arg(long, env = "EISCP_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

impl DeviceArgs {
    pub fn session_config(&self) -> CliResult<SessionConfig> {
        let mut config = SessionConfig::new(self.host.clone()).with_port(self.port);
        config.connect_timeout = parse_duration(&self.connect_timeout)?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Three-character command code (e.g. PWR, MVL).
    pub code: String,
    /// Command argument (e.g. 01, UP, QSTN).
    #[arg(default_value = "")]
    pub argument: String,
    /// Collect replies until the command is echoed or the timeout expires.
    #[arg(long, conflicts_with = "strict")]
    pub wait: bool,
    /// Wait for the exact echo, ignoring menu and list chatter.
    #[arg(long)]
    pub strict: bool,
    /// Maximum time to wait for replies (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Three-character command code (e.g. PWR, MVL).
    pub code: String,
    /// Maximum time to wait for the reply (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Only print frames with these command codes (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub codes: Option<Vec<String>>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Queries to send once connected (comma-separated codes).
    #[arg(long, value_delimiter = ',')]
    pub query: Option<Vec<String>>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a command code, accepting lowercase input.
pub fn parse_code(input: &str) -> CliResult<CommandCode> {
    input
        .trim()
        .to_ascii_uppercase()
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("{err}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_code_normalizes_case() {
        assert_eq!(parse_code("pwr").unwrap().as_str(), "PWR");
        assert_eq!(parse_code("PWRX").unwrap_err().code, USAGE);
    }
}
