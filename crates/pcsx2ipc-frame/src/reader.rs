use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use pcsx2ipc_transport::{IpcStream, TransportError};

use crate::codec::{decode_reply, decode_request, FrameConfig, Response};
use crate::command::{Command, ReplyKind};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete requests or replies from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the reply to a request whose reply layout is `layout` (blocking).
    ///
    /// Bytes left over after the reply mean client and server disagree on
    /// framing, and are reported as [`FrameError::TrailingBytes`].
    pub fn read_reply(&mut self, layout: &[ReplyKind]) -> Result<Response> {
        let max = self.config.limits.max_reply_size;
        loop {
            if let Some(response) = decode_reply(&mut self.buf, layout, max)? {
                if !self.buf.is_empty() {
                    let trailing = self.buf.len();
                    self.buf.clear();
                    tracing::debug!(trailing, commands = layout.len(), "bytes left after reply");
                    return Err(FrameError::TrailingBytes(trailing));
                }
                return Ok(response);
            }
            self.fill()?;
        }
    }

    /// Read the next request (blocking). Server side.
    pub fn read_request(&mut self) -> Result<Vec<Command>> {
        loop {
            if let Some(commands) = decode_request(&mut self.buf, &self.config.limits)? {
                tracing::trace!(commands = commands.len(), "request decoded");
                return Ok(commands);
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) if self.buf.is_empty() => return Err(FrameError::ConnectionClosed),
                Ok(0) => {
                    return Err(FrameError::Truncated {
                        buffered: self.buf.len(),
                    })
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Drop any partially received frame.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<IpcStream> {
    /// Create a frame reader for `IpcStream` and apply read timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;

    use super::*;
    use crate::codec::{encode_batch, encode_request, Limits};
    use crate::command::{EmuStatus, Reply, SizeClass};
    use crate::opcode::{IPC_FAIL, IPC_OK};

    fn ok_reply(payload: &[u8]) -> Vec<u8> {
        let mut wire = vec![IPC_OK];
        wire.extend_from_slice(payload);
        wire
    }

    #[test]
    fn read_value_reply() {
        let wire = ok_reply(&0xDEAD_BEEFu32.to_le_bytes());
        let mut reader = FrameReader::new(Cursor::new(wire));
        let response = reader
            .read_reply(&[ReplyKind::Value(SizeClass::U32)])
            .unwrap();
        assert_eq!(response, Response::Ok(vec![Reply::Value(0xDEAD_BEEF)]));
    }

    #[test]
    fn read_reply_across_partial_reads() {
        let mut payload = BytesMut::new();
        payload.put_u32_le(11);
        payload.put_slice(b"Ico (NTSC)\0");
        payload.put_u32_le(0);
        let wire = ok_reply(&payload);

        let mut reader = FrameReader::new(ByteByByteReader {
            bytes: wire,
            pos: 0,
        });
        let response = reader
            .read_reply(&[ReplyKind::Text, ReplyKind::Status])
            .unwrap();
        assert_eq!(
            response,
            Response::Ok(vec![
                Reply::Text("Ico (NTSC)".into()),
                Reply::Status(EmuStatus::Running),
            ])
        );
    }

    #[test]
    fn fail_reply() {
        let mut reader = FrameReader::new(Cursor::new(vec![IPC_FAIL]));
        let response = reader
            .read_reply(&[ReplyKind::Value(SizeClass::U64), ReplyKind::Text])
            .unwrap();
        assert_eq!(response, Response::Fail);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_reply(&[ReplyKind::Empty]).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_reply() {
        let wire = ok_reply(&[0x01, 0x02]);
        let mut reader = FrameReader::new(Cursor::new(wire));
        let err = reader
            .read_reply(&[ReplyKind::Value(SizeClass::U64)])
            .unwrap_err();
        assert!(matches!(err, FrameError::Truncated { buffered: 3 }));
    }

    #[test]
    fn trailing_bytes_after_reply() {
        let wire = ok_reply(&[0x05, 0x06]);
        let mut reader = FrameReader::new(Cursor::new(wire));
        let err = reader
            .read_reply(&[ReplyKind::Value(SizeClass::U8)])
            .unwrap_err();
        assert!(matches!(err, FrameError::TrailingBytes(1)));
    }

    #[test]
    fn oversized_reply_rejected() {
        let cfg = FrameConfig {
            limits: Limits {
                max_reply_size: 4,
                ..Limits::default()
            },
            ..FrameConfig::default()
        };
        let wire = ok_reply(&[0; 8]);
        let mut reader = FrameReader::with_config(Cursor::new(wire), cfg);
        let err = reader
            .read_reply(&[ReplyKind::Value(SizeClass::U64)])
            .unwrap_err();
        assert!(matches!(err, FrameError::ReplyTooLarge { size: 9, max: 4 }));
    }

    #[test]
    fn read_pipelined_requests() {
        let mut wire = BytesMut::new();
        encode_request(&Command::Status, &mut wire);
        encode_batch(
            &[
                Command::Read {
                    address: 0x20,
                    size: SizeClass::U16,
                },
                Command::GameUuid,
            ],
            &mut wire,
        )
        .unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(reader.read_request().unwrap(), vec![Command::Status]);
        assert_eq!(
            reader.read_request().unwrap(),
            vec![
                Command::Read {
                    address: 0x20,
                    size: SizeClass::U16
                },
                Command::GameUuid,
            ]
        );
        assert!(matches!(
            reader.read_request(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let reader = ErrorThenData {
            kind: ErrorKind::WouldBlock,
            state: 0,
            bytes: ok_reply(&[]),
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_reply(&[ReplyKind::Empty]).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = ErrorThenData {
            kind: ErrorKind::Interrupted,
            state: 0,
            bytes: ok_reply(&[]),
        };
        let mut framed = FrameReader::new(reader);
        let response = framed.read_reply(&[ReplyKind::Empty]).unwrap();
        assert_eq!(response, Response::Ok(vec![Reply::Done]));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        reader.clear();
        let _inner = reader.into_inner();
    }

    #[test]
    #[cfg(unix)]
    fn read_timeout_surfaces_as_timeout() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_ipc(IpcStream::from_unix(right), cfg).unwrap();
        let err = reader.read_reply(&[ReplyKind::Empty]).unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");
        drop(left);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct ErrorThenData {
        kind: ErrorKind,
        state: u8,
        bytes: Vec<u8>,
    }

    impl Read for ErrorThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(self.kind));
            }
            let n = self.bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[..n]);
            self.bytes.drain(..n);
            Ok(n)
        }
    }
}
