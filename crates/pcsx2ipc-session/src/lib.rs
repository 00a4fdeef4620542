//! Connection handle, batching and reference server for the PCSX2 IPC protocol.
//!
//! [`Connection`] is the client: it owns one socket, runs blocking round
//! trips with a bounded timeout, and records the outcome of every call as an
//! [`ErrorCode`]. [`Batch`] groups commands into a single round trip.
//! [`IpcServer`] answers the same protocol from an [`EmulatorBackend`].

pub mod backend;
pub mod batch;
pub mod config;
pub mod connection;
pub mod error;
pub mod listener;

pub use backend::{
    BackendFault, BackendResult, EmulatorBackend, GameInfo, MemoryEmulator, EE_RAM_SIZE,
};
pub use batch::{Batch, BatchReplies};
pub use config::{
    parse_timeout, ConnectionConfig, DEFAULT_TIMEOUT, ENV_SLOT, ENV_SOCKET, ENV_TIMEOUT_MS,
};
pub use connection::{Connection, ConnectionState};
pub use error::{ErrorCode, IpcError, Limit, Result};
pub use listener::{serve_client, IpcServer, ServerConfig};
