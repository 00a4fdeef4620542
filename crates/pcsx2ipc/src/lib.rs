//! Client, reference server and CLI for the PCSX2 IPC protocol.
//!
//! PCSX2 exposes emulated memory and a few emulator controls over a local
//! socket. This crate re-exports the layered implementation:
//!
//! - [`transport`]: socket endpoints per slot (Unix sockets, TCP loopback on Windows)
//! - [`frame`]: opcodes, request and reply encoding, frame reader and writer
//! - [`session`]: the [`session::Connection`] handle, batches, error codes and
//!   the reference server
//!
//! ```no_run
//! use pcsx2ipc::frame::SizeClass;
//! use pcsx2ipc::session::{Connection, ConnectionConfig};
//!
//! let mut conn = Connection::open(ConnectionConfig::default())?;
//! conn.write(0x0034_7D34, SizeClass::U8, 5)?;
//! assert_eq!(conn.read(0x0034_7D34, SizeClass::U8)?, 5);
//! # Ok::<(), pcsx2ipc::session::IpcError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use pcsx2ipc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pcsx2ipc_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use pcsx2ipc_session::*;
}
