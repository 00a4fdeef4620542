use std::io::ErrorKind;
use std::path::PathBuf;

/// Errors that can occur in IPC transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the listening endpoint.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to connect to the emulator endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// An endpoint string could not be parsed.
    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),

    /// The endpoint kind cannot be used on this platform.
    #[error("unsupported endpoint on this platform: {0}")]
    Unsupported(String),
}

impl TransportError {
    /// Whether the underlying I/O error is a read/write timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Io(err) | TransportError::Connect { source: err, .. } => {
                is_timeout(err)
            }
            _ => false,
        }
    }
}

/// Socket timeouts surface as `WouldBlock` on Unix and `TimedOut` on Windows.
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

pub type Result<T> = std::result::Result<T, TransportError>;
