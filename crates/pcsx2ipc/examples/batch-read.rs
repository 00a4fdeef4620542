//! Reads a block of EE RAM from a running emulator in one round trip.
//!
//! Run with:
//!   cargo run --example batch-read -- [slot]

use pcsx2ipc::frame::SizeClass;
use pcsx2ipc::session::{Batch, Connection, ConnectionConfig};
use pcsx2ipc::transport::DEFAULT_SLOT;

const BASE: u32 = 0x0034_7D00;
const WORDS: u32 = 16;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let slot = match std::env::args().nth(1) {
        Some(raw) => raw.parse()?,
        None => DEFAULT_SLOT,
    };
    let mut conn = Connection::open(ConnectionConfig::for_slot(slot))?;
    let endpoint = conn.config().endpoint.clone();
    eprintln!("Connected to {} ({})", endpoint, conn.version()?);

    let mut batch = Batch::new(conn.config().limits);
    let status = batch.status()?;
    for i in 0..WORDS {
        batch.read(BASE + i * 4, SizeClass::U32)?;
    }

    let replies = conn.send_batch(&batch)?;
    if let Some(status) = replies.get(status).and_then(|reply| reply.as_status()) {
        eprintln!("Emulator is {}", status.name());
    }
    for i in 0..WORDS {
        if let Some(value) = replies.value(status + 1 + i as usize) {
            println!("{:#010x}: {value:#010x}", BASE + i * 4);
        }
    }

    conn.close();
    Ok(())
}
