use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Crates that log individual frames and socket reads.
const WIRE_TARGETS: [&str; 2] = ["eiscp_frame", "eiscp_transport"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Per-crate filter for `level`.
///
/// The CLI and session layers follow `level`. Frame and transport crates stop
/// at `debug` unless `wire` is set, so `--log-level trace` shows session
/// decisions without a line per socket read. Other crates stay at `warn`.
pub fn log_targets(level: LogLevel, wire: bool) -> Targets {
    let level = level.as_filter();
    let wire_level = if wire {
        level
    } else {
        level.min(LevelFilter::DEBUG)
    };

    let targets = Targets::new()
        .with_default(level.min(LevelFilter::WARN))
        .with_target("eiscp", level)
        .with_target("eiscp_session", level);
    WIRE_TARGETS
        .into_iter()
        .fold(targets, |targets, target| targets.with_target(target, wire_level))
}

/// Install the stderr subscriber; stdout is reserved for frames.
pub fn init_logging(format: LogFormat, level: LogLevel, wire: bool) {
    let targets = log_targets(level, wire);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(matches!(level, LogLevel::Debug | LogLevel::Trace));

    // A subscriber installed earlier (tests) wins.
    let _ = match format {
        LogFormat::Text => builder.finish().with(targets).try_init(),
        LogFormat::Json => builder.json().finish().with(targets).try_init(),
    };
}
