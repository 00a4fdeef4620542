use std::fmt;
use std::io;

use pcsx2ipc_session::{ErrorCode, IpcError};
use pcsx2ipc_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn ipc_error(context: &str, err: IpcError) -> CliError {
    if let IpcError::Transport(err) = err {
        return transport_error(context, err);
    }

    let code = match err.code() {
        ErrorCode::Success => SUCCESS,
        ErrorCode::Fail => FAILURE,
        ErrorCode::Connection => TRANSPORT_ERROR,
        ErrorCode::Timeout => TIMEOUT,
        ErrorCode::Frame | ErrorCode::OutOfMemory => DATA_INVALID,
        ErrorCode::InvalidAddress | ErrorCode::InvalidArgument => USAGE,
        ErrorCode::Unimplemented | ErrorCode::Unknown => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}
