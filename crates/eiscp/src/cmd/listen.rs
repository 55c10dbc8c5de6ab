use eiscp_frame::{CommandCode, QUERY};
use eiscp_session::PersistentSession;
use tracing::{info, warn};

use crate::cmd::{parse_code, ListenArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let codes = parse_codes(args.codes.as_deref())?;
    let queries = parse_codes(args.query.as_deref())?;
    let config = args.device.session_config()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?;

    runtime.block_on(async move {
        let session = PersistentSession::connect(config)
            .await
            .map_err(|err| session_error("connect failed", err))?;
        let mut frames = session.subscribe();

        let queue = session.command_queue();
        for code in queries {
            if let Err(err) = queue.send(code, QUERY).await {
                warn!(command = %code, error = %err, "query failed");
            }
        }

        let mut printed = 0usize;
        loop {
            let frame = tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
            };

            if !codes.is_empty() && !codes.contains(&frame.command) {
                continue;
            }

            print_frame(&frame, format);
            printed = printed.saturating_add(1);

            if args.count.is_some_and(|count| printed >= count) {
                break;
            }
        }

        session.close().await;
        Ok(SUCCESS)
    })
}

fn parse_codes(input: Option<&[String]>) -> CliResult<Vec<CommandCode>> {
    input
        .unwrap_or_default()
        .iter()
        .map(|code| parse_code(code))
        .collect()
}
