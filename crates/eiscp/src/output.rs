use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use eiscp_frame::Frame;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    command: &'a str,
    argument: &'a str,
    destination: String,
    version: u8,
    not_available: bool,
    timestamp: String,
}

impl<'a> FrameOutput<'a> {
    fn new(frame: &'a Frame) -> Self {
        Self {
            command: frame.command.as_str(),
            argument: &frame.argument,
            destination: frame.destination.to_string(),
            version: frame.version,
            not_available: frame.is_not_available(),
            timestamp: now_unix_seconds(),
        }
    }
}

/// Print one frame as it arrives.
pub fn print_frame(frame: &Frame, format: OutputFormat) {
    print_frames(std::slice::from_ref(frame), format);
}

/// Print a batch of frames; JSON output is one object per line.
pub fn print_frames(frames: &[Frame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for frame in frames {
                println!(
                    "{}",
                    serde_json::to_string(&FrameOutput::new(frame))
                        .unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            if frames.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "ARGUMENT", "DEST", "VERSION"]);
            for frame in frames {
                table.add_row(vec![
                    frame.command.to_string(),
                    frame.argument.clone(),
                    frame.destination.to_string(),
                    frame.version.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                println!(
                    "command={} argument={} destination={} version={}",
                    frame.command, frame.argument, frame.destination, frame.version
                );
            }
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            for frame in frames {
                let _ = writeln!(out, "{}{}", frame.command, frame.argument);
            }
            let _ = out.flush();
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use eiscp_frame::CommandCode;

    use super::*;

    #[test]
    fn json_output_carries_raw_fields() {
        let frame = Frame::new(CommandCode::from_static(b"TPD"), "N/A");
        let json = serde_json::to_value(FrameOutput::new(&frame)).expect("frame serializes");
        assert_eq!(json["command"], "TPD");
        assert_eq!(json["argument"], "N/A");
        assert_eq!(json["destination"], "1");
        assert_eq!(json["version"], 1);
        assert_eq!(json["not_available"], true);
    }
}
