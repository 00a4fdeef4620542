//! Local socket transport for the PCSX2 IPC protocol.
//!
//! PCSX2 listens on a Unix domain socket on Linux/macOS and on a TCP
//! loopback port on Windows. Both are exposed as one blocking [`IpcStream`].
//!
//! This is the lowest layer of pcsx2ipc. [`Endpoint`] decides where to
//! connect, [`Listener`] is the server-side counterpart used by the
//! reference server.

pub mod endpoint;
pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{socket_file_name, Endpoint, Listener, DEFAULT_SLOT, SOCKET_NAME};
pub use error::{is_timeout, Result, TransportError};
pub use tcp::TcpSocket;
pub use traits::IpcStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
