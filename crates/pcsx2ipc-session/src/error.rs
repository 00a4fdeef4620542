use std::fmt;
use std::time::Duration;

use pcsx2ipc_frame::{FrameError, SizeClass};
use pcsx2ipc_transport::TransportError;

/// Status of the most recent operation on a connection.
///
/// Codes 0 through 4 match the numbering PCSX2 client libraries use.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCode {
    #[default]
    Success = 0,
    /// The emulator replied FAIL.
    Fail = 1,
    /// A request or reply exceeds a size ceiling.
    OutOfMemory = 2,
    /// Unknown opcode.
    Unimplemented = 3,
    Unknown = 4,
    /// Transport unavailable or handle terminated.
    Connection = 5,
    /// Malformed or truncated reply.
    Frame = 6,
    Timeout = 7,
    InvalidAddress = 8,
    InvalidArgument = 9,
}

impl ErrorCode {
    pub fn from_i32(value: i32) -> Option<Self> {
        let code = match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::Fail,
            2 => ErrorCode::OutOfMemory,
            3 => ErrorCode::Unimplemented,
            4 => ErrorCode::Unknown,
            5 => ErrorCode::Connection,
            6 => ErrorCode::Frame,
            7 => ErrorCode::Timeout,
            8 => ErrorCode::InvalidAddress,
            9 => ErrorCode::InvalidArgument,
            _ => return None,
        };
        Some(code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::Fail => "fail",
            ErrorCode::OutOfMemory => "out_of_memory",
            ErrorCode::Unimplemented => "unimplemented",
            ErrorCode::Unknown => "unknown",
            ErrorCode::Connection => "connection",
            ErrorCode::Frame => "frame",
            ErrorCode::Timeout => "timeout",
            ErrorCode::InvalidAddress => "invalid_address",
            ErrorCode::InvalidArgument => "invalid_argument",
        }
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which ceiling a batch ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    RequestSize,
    ReplySize,
    CommandCount,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Limit::RequestSize => "request size",
            Limit::ReplySize => "reply size",
            Limit::CommandCount => "command count",
        })
    }
}

/// Errors returned by connection and server operations.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[source] FrameError),

    /// A size ceiling would be exceeded. Nothing was sent.
    #[error("{limit} limit exceeded ({size}, max {max})")]
    LimitExceeded { limit: Limit, size: usize, max: usize },

    /// The emulator rejected the request.
    #[error("emulator replied FAIL")]
    Fail,

    /// A round trip timed out; the connection is terminated.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection was terminated by an earlier timeout.
    #[error("connection terminated by an earlier timeout")]
    Terminated,

    /// The connection was closed.
    #[error("connection closed")]
    Closed,

    /// The access would run past the end of the 32-bit address space.
    #[error("invalid address {address:#010x} for {size} access")]
    InvalidAddress { address: u32, size: SizeClass },

    /// A bad argument from the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The reply does not carry the payload the command expects.
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

impl From<FrameError> for IpcError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::RequestTooLarge { size, max } => IpcError::LimitExceeded {
                limit: Limit::RequestSize,
                size,
                max,
            },
            FrameError::ReplyTooLarge { size, max } => IpcError::LimitExceeded {
                limit: Limit::ReplySize,
                size,
                max,
            },
            FrameError::TooManyCommands { count, max } => IpcError::LimitExceeded {
                limit: Limit::CommandCount,
                size: count,
                max,
            },
            other => IpcError::Frame(other),
        }
    }
}

impl IpcError {
    /// The [`ErrorCode`] reported for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            IpcError::Transport(TransportError::Io(err))
                if pcsx2ipc_transport::is_timeout(err) =>
            {
                ErrorCode::Timeout
            }
            IpcError::Transport(TransportError::InvalidEndpoint(_)) => ErrorCode::InvalidArgument,
            IpcError::Transport(_) => ErrorCode::Connection,
            IpcError::Frame(err) => match err {
                _ if err.is_timeout() => ErrorCode::Timeout,
                FrameError::UnknownOpcode(_) => ErrorCode::Unimplemented,
                FrameError::EmptyRequest => ErrorCode::InvalidArgument,
                FrameError::Io(_) | FrameError::ConnectionClosed => ErrorCode::Connection,
                _ => ErrorCode::Frame,
            },
            IpcError::LimitExceeded { .. } => ErrorCode::OutOfMemory,
            IpcError::Fail => ErrorCode::Fail,
            IpcError::Timeout(_) => ErrorCode::Timeout,
            IpcError::Terminated | IpcError::Closed => ErrorCode::Connection,
            IpcError::InvalidAddress { .. } => ErrorCode::InvalidAddress,
            IpcError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            IpcError::UnexpectedReply(_) => ErrorCode::Frame,
        }
    }

    /// Whether this error came from a socket timeout.
    pub fn is_timeout(&self) -> bool {
        self.code() == ErrorCode::Timeout
    }
}

pub type Result<T> = std::result::Result<T, IpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip_through_i32() {
        for value in 0..=9 {
            let code = ErrorCode::from_i32(value).unwrap();
            assert_eq!(i32::from(code), value);
        }
        assert_eq!(ErrorCode::from_i32(10), None);
        assert_eq!(ErrorCode::from_i32(-1), None);
    }

    #[test]
    fn size_errors_become_limit_exceeded() {
        let err = IpcError::from(FrameError::RequestTooLarge {
            size: 700_000,
            max: 650_000,
        });
        assert!(matches!(
            err,
            IpcError::LimitExceeded {
                limit: Limit::RequestSize,
                ..
            }
        ));
        assert_eq!(err.code(), ErrorCode::OutOfMemory);
        assert_eq!(
            err.to_string(),
            "request size limit exceeded (700000, max 650000)"
        );
    }

    #[test]
    fn frame_errors_map_to_codes() {
        let timeout = IpcError::from(FrameError::Io(std::io::ErrorKind::WouldBlock.into()));
        assert_eq!(timeout.code(), ErrorCode::Timeout);

        let reset = IpcError::from(FrameError::Io(
            std::io::ErrorKind::ConnectionReset.into(),
        ));
        assert_eq!(reset.code(), ErrorCode::Connection);

        assert_eq!(
            IpcError::from(FrameError::ConnectionClosed).code(),
            ErrorCode::Connection
        );
        assert_eq!(
            IpcError::from(FrameError::Truncated { buffered: 3 }).code(),
            ErrorCode::Frame
        );
        assert_eq!(
            IpcError::from(FrameError::UnknownOpcode(0x42)).code(),
            ErrorCode::Unimplemented
        );
    }

    #[test]
    fn transport_errors_map_to_connection() {
        let err = IpcError::from(TransportError::Connect {
            endpoint: "unix:/tmp/pcsx2.sock".into(),
            source: std::io::ErrorKind::NotFound.into(),
        });
        assert_eq!(err.code(), ErrorCode::Connection);
        assert_eq!(IpcError::Terminated.code(), ErrorCode::Connection);
        assert_eq!(IpcError::Closed.code(), ErrorCode::Connection);
    }

    #[test]
    fn invalid_address_message() {
        let err = IpcError::InvalidAddress {
            address: 0xFFFF_FFFE,
            size: SizeClass::U32,
        };
        assert_eq!(err.to_string(), "invalid address 0xfffffffe for u32 access");
        assert_eq!(err.code(), ErrorCode::InvalidAddress);
    }
}
