/// Errors that can occur during request/reply encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A command record starts with a byte that is not a known opcode.
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    /// A MultiCommand header appeared inside a batch.
    #[error("nested multi-command in batch")]
    NestedBatch,

    /// A request with no commands.
    #[error("request contains no commands")]
    EmptyRequest,

    /// The reply result byte is neither OK nor FAIL.
    #[error("invalid reply result byte 0x{0:02X}")]
    InvalidResult(u8),

    /// A status reply carries an unknown emulator state.
    #[error("invalid emulator status {0}")]
    InvalidStatus(u32),

    /// The request exceeds the configured size ceiling.
    #[error("request too large ({size} bytes, max {max})")]
    RequestTooLarge { size: usize, max: usize },

    /// The reply exceeds the configured size ceiling.
    #[error("reply too large ({size} bytes, max {max})")]
    ReplyTooLarge { size: usize, max: usize },

    /// The batch holds more commands than allowed.
    #[error("too many commands in batch ({count}, max {max})")]
    TooManyCommands { count: usize, max: usize },

    /// A reply does not match the shape its command expects.
    #[error("reply {index} does not match its command")]
    ReplyMismatch { index: usize },

    /// Bytes arrived after a complete reply; the stream is out of sync.
    #[error("{0} unexpected bytes after reply")]
    TrailingBytes(usize),

    /// The peer closed the stream in the middle of a frame.
    #[error("truncated frame ({buffered} bytes received)")]
    Truncated { buffered: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before sending anything.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether this is a socket read/write timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::Io(err) if pcsx2ipc_transport::is_timeout(err))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
