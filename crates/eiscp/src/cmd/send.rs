use eiscp_session::Session;
use tracing::info;

use crate::cmd::{parse_code, parse_duration, SendArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_frame, print_frames, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let command = parse_code(&args.code)?;
    let timeout = parse_duration(&args.timeout)?;
    let config = args
        .device
        .session_config()?
        .with_reply_timeout(timeout)
        .with_read_timeout(timeout);

    let session = Session::connect(config).map_err(|err| session_error("connect failed", err))?;

    if args.strict {
        let frame = session
            .request_exact(command, &args.argument)
            .map_err(|err| session_error("request failed", err))?;
        print_frame(&frame, format);
    } else if args.wait {
        let frames = session
            .request_all(command, &args.argument)
            .map_err(|err| session_error("request failed", err))?;
        if frames.is_empty() {
            info!(%command, "no replies before timeout");
        }
        print_frames(&frames, format);
    } else {
        session
            .send_only(command, &args.argument)
            .map_err(|err| session_error("send failed", err))?;
    }

    session.close();
    Ok(SUCCESS)
}
