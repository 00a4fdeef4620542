use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pcsx2ipc_frame::EmuStatus;
use pcsx2ipc_session::{GameInfo, IpcServer, MemoryEmulator, ServerConfig};
use pcsx2ipc_transport::Endpoint;

use crate::cmd::{ServeArgs, TargetArgs};
use crate::exit::{ipc_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs, target: &TargetArgs) -> CliResult<i32> {
    let endpoint = target.endpoint()?;
    let emulator = build_emulator(&args);

    let server = IpcServer::bind(&endpoint, emulator)
        .map_err(|err| ipc_error("bind failed", err))?
        .with_config(ServerConfig {
            idle_timeout: args.idle_timeout.filter(|timeout| !timeout.is_zero()),
            ..ServerConfig::default()
        });

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), server.endpoint())?;

    tracing::info!(endpoint = %server.endpoint(), "serving until interrupted");
    server
        .serve(&running)
        .map_err(|err| ipc_error("serve failed", err))?;
    tracing::info!("server stopped");
    Ok(SUCCESS)
}

fn build_emulator(args: &ServeArgs) -> MemoryEmulator {
    let emulator = match args.ram_size {
        Some(size) => MemoryEmulator::with_ram_size(size as usize),
        None => MemoryEmulator::new(),
    };
    let status = if args.paused {
        EmuStatus::Paused
    } else {
        EmuStatus::Running
    };
    emulator
        .with_game(GameInfo {
            title: args.title.clone(),
            id: args.game_id.clone(),
            uuid: args.game_uuid.clone(),
            version: args.game_version.clone(),
        })
        .with_status(status)
}

/// Stop accepting on Ctrl-C. The accept loop only sees the flag once a
/// client arrives, so the handler connects once to wake it.
fn install_ctrlc_handler(running: Arc<AtomicBool>, endpoint: Endpoint) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = endpoint.connect(Some(Duration::from_millis(200)));
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
