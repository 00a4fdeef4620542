use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use pcsx2ipc_transport::IpcStream;

use crate::codec::{encode_batch, encode_reply, encode_request, FrameConfig, Response};
use crate::command::{Command, ReplyKind};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete requests or replies to any `Write` stream.
///
/// Only `Interrupted` is retried. With a socket timeout set, `WouldBlock`
/// and `TimedOut` surface as [`FrameError::Io`] so callers can detect them.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Send one command as a bare request.
    pub fn send_request(&mut self, command: &Command) -> Result<()> {
        self.buf.clear();
        encode_request(command, &mut self.buf);
        self.write_buf()
    }

    /// Send commands as one MultiCommand batch.
    ///
    /// The batch is checked against the configured limits before anything
    /// is written.
    pub fn send_batch(&mut self, commands: &[Command]) -> Result<()> {
        self.config.limits.check_batch(commands)?;
        self.buf.clear();
        encode_batch(commands, &mut self.buf)?;
        self.write_buf()
    }

    /// Send a reply shaped by `layout`. Server side.
    pub fn send_reply(&mut self, response: &Response, layout: &[ReplyKind]) -> Result<()> {
        self.buf.clear();
        encode_reply(response, layout, &self.config.limits, &mut self.buf)?;
        self.write_buf()
    }

    fn write_buf(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<IpcStream> {
    /// Create a frame writer for `IpcStream` and apply write timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
