use eiscp_session::Session;

use crate::cmd::{parse_code, parse_duration, QueryArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: QueryArgs, format: OutputFormat) -> CliResult<i32> {
    let command = parse_code(&args.code)?;
    let timeout = parse_duration(&args.timeout)?;
    let config = args
        .device
        .session_config()?
        .with_reply_timeout(timeout)
        .with_read_timeout(timeout);

    let session = Session::connect(config).map_err(|err| session_error("connect failed", err))?;
    let frame = session
        .query(command)
        .map_err(|err| session_error("query failed", err))?;
    print_frame(&frame, format);

    session.close();
    Ok(SUCCESS)
}
