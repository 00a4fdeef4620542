use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::IpcStream;

/// TCP loopback endpoint, as used by PCSX2 on Windows.
pub struct TcpSocket {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpSocket {
    /// Bind and listen on `addr`. Port 0 picks a free port.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            endpoint: addr.to_string(),
            source,
        })?;
        let addr = listener.local_addr()?;
        info!(%addr, "emulator tcp socket listening");
        Ok(Self { listener, addr })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted client");
        Ok(IpcStream::from_tcp(stream))
    }

    /// Connect to `addr`, bounded by `timeout` when given.
    pub fn connect(addr: SocketAddr, timeout: Option<Duration>) -> Result<IpcStream> {
        let connected = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        let stream = connected.map_err(|source| TransportError::Connect {
            endpoint: addr.to_string(),
            source,
        })?;
        debug!(%addr, "connected to emulator tcp socket");
        Ok(IpcStream::from_tcp(stream))
    }

    /// The bound address (with the real port when bound to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}
