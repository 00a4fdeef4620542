use pcsx2ipc_frame::{MAX_BATCH_COMMANDS, MAX_REPLY_SIZE, MAX_REQUEST_SIZE};
use pcsx2ipc_transport::{Endpoint, DEFAULT_SLOT};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("pcsx2ipc {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: pcsx2ipc");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("PCSX2IPC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("default_endpoint: {}", Endpoint::for_slot(DEFAULT_SLOT));
    println!(
        "limits: request={MAX_REQUEST_SIZE} reply={MAX_REPLY_SIZE} batch_commands={MAX_BATCH_COMMANDS}"
    );

    Ok(SUCCESS)
}
