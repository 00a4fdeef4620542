use std::ffi::OsString;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::tcp::TcpSocket;
use crate::traits::IpcStream;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Default PCSX2 IPC slot. Doubles as the TCP port on Windows.
pub const DEFAULT_SLOT: u16 = 28011;

/// Base name of the PCSX2 Unix socket.
pub const SOCKET_NAME: &str = "pcsx2.sock";

/// Where the emulator's IPC server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// TCP socket address (loopback on Windows).
    Tcp(SocketAddr),
}

impl Endpoint {
    /// The endpoint PCSX2 uses for `slot` on this platform.
    pub fn for_slot(slot: u16) -> Self {
        #[cfg(unix)]
        {
            Endpoint::Unix(socket_dir(|key| std::env::var_os(key)).join(socket_file_name(slot)))
        }
        #[cfg(not(unix))]
        {
            Endpoint::Tcp(SocketAddr::from(([127, 0, 0, 1], slot)))
        }
    }

    /// Open a client connection to this endpoint.
    ///
    /// `timeout` bounds the TCP connect; Unix sockets connect immediately or fail.
    pub fn connect(&self, timeout: Option<Duration>) -> Result<IpcStream> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let _ = timeout;
                UnixDomainSocket::connect(path)
            }
            #[cfg(not(unix))]
            Endpoint::Unix(path) => {
                let _ = timeout;
                Err(TransportError::Unsupported(path.display().to_string()))
            }
            Endpoint::Tcp(addr) => TcpSocket::connect(*addr, timeout),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::for_slot(DEFAULT_SLOT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    /// Parse `unix:<path>`, `tcp:<addr>`, a bare socket address, or a bare path.
    fn from_str(s: &str) -> Result<Self> {
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = s.strip_prefix("tcp:") {
            return addr
                .parse()
                .map(Endpoint::Tcp)
                .map_err(|_| TransportError::InvalidEndpoint(s.to_string()));
        }
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Endpoint::Tcp(addr));
        }
        if s.is_empty() {
            return Err(TransportError::InvalidEndpoint(s.to_string()));
        }
        Ok(Endpoint::Unix(PathBuf::from(s)))
    }
}

/// Socket file name for a slot: `pcsx2.sock`, or `pcsx2.sock.<slot>` off the default.
pub fn socket_file_name(slot: u16) -> String {
    if slot == DEFAULT_SLOT {
        SOCKET_NAME.to_string()
    } else {
        format!("{SOCKET_NAME}.{slot}")
    }
}

/// Runtime directory PCSX2 places its socket in.
///
/// `$TMPDIR` on macOS, `$XDG_RUNTIME_DIR` elsewhere, `/tmp` when unset.
fn socket_dir(env: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    let key = if cfg!(target_os = "macos") {
        "TMPDIR"
    } else {
        "XDG_RUNTIME_DIR"
    };
    env(key)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Server-side listener for either endpoint kind.
pub enum Listener {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(TcpSocket),
}

impl Listener {
    /// Bind a listener at `endpoint`.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Listener::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(TransportError::Unsupported(path.display().to_string())),
            Endpoint::Tcp(addr) => Ok(Listener::Tcp(TcpSocket::bind(*addr)?)),
        }
    }

    /// Accept the next client (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        match self {
            #[cfg(unix)]
            Listener::Unix(socket) => socket.accept(),
            Listener::Tcp(socket) => socket.accept(),
        }
    }

    /// The endpoint clients should connect to.
    ///
    /// For TCP this carries the real port when bound to port 0.
    pub fn endpoint(&self) -> Endpoint {
        match self {
            #[cfg(unix)]
            Listener::Unix(socket) => Endpoint::Unix(socket.path().to_path_buf()),
            Listener::Tcp(socket) => Endpoint::Tcp(socket.local_addr()),
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("endpoint", &self.endpoint())
            .finish()
    }
}
