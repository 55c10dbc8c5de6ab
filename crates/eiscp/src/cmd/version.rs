use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("eiscp {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: eiscp");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", env!("EISCP_BUILD_TARGET"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("default_port: {}", eiscp_transport::DEFAULT_PORT);
    println!("protocol_version: {}", eiscp_frame::PROTOCOL_VERSION);

    Ok(SUCCESS)
}
