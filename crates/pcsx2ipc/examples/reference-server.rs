//! In-memory PCSX2 stand-in: serves the IPC protocol on a private socket.
//!
//! Run with:
//!   cargo run --example reference-server
//!
//! In another terminal, point the CLI at the printed endpoint:
//!   cargo run --features cli -- --socket <endpoint> read 0x00347D34 --size 8

use std::fs;
use std::sync::atomic::AtomicBool;

use pcsx2ipc::session::{GameInfo, IpcServer, MemoryEmulator};
use pcsx2ipc::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("pcsx2ipc-example-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let endpoint = Endpoint::Unix(sock_dir.join("pcsx2.sock"));

    let emulator = MemoryEmulator::new().with_game(GameInfo {
        title: "Example Game".into(),
        id: "SLUS-00000".into(),
        uuid: "00000000".into(),
        version: "1.00".into(),
    });
    let server = IpcServer::bind(&endpoint, emulator)?;
    eprintln!("Listening on {}", server.endpoint());

    // Serves until the process is killed.
    let running = AtomicBool::new(true);
    server.serve(&running)?;

    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
