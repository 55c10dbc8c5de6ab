mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "eiscp", version, about = "Talk to Onkyo/Integra receivers over eISCP")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Also trace individual frames and socket reads.
    #[arg(long, global = true)]
    log_wire: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level, cli.log_wire);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "eiscp",
            "send",
            "--host",
            "192.168.1.152",
            "PWR",
            "01",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.code, "PWR");
                assert_eq!(args.argument, "01");
                assert_eq!(args.device.port, 60128);
                assert!(!args.wait);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_wait_with_strict() {
        let err = Cli::try_parse_from([
            "eiscp",
            "send",
            "--host",
            "10.0.0.2",
            "--wait",
            "--strict",
            "PWR",
            "QSTN",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn log_flags_are_global() {
        let cli = Cli::try_parse_from([
            "eiscp",
            "query",
            "--host",
            "10.0.0.2",
            "PWR",
            "--log-level",
            "trace",
            "--log-wire",
        ])
        .expect("log flags should parse after the subcommand");
        assert_eq!(cli.log_level, LogLevel::Trace);
        assert!(cli.log_wire);
    }

    #[test]
    fn parses_listen_subcommand() {
        let cli = Cli::try_parse_from([
            "eiscp",
            "listen",
            "--host",
            "10.0.0.2",
            "--codes",
            "NLT,NTM",
            "--count",
            "3",
        ])
        .expect("listen args should parse");
        match cli.command {
            Command::Listen(args) => {
                assert_eq!(args.codes.as_deref().map(<[String]>::len), Some(2));
                assert_eq!(args.count, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
