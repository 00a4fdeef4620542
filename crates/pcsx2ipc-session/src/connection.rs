use std::fmt;
use std::time::{Duration, Instant};

use pcsx2ipc_frame::{
    Command, EmuStatus, FrameReader, FrameWriter, Reply, ReplyKind, Response, SizeClass,
};
use pcsx2ipc_transport::IpcStream;

use crate::batch::{Batch, BatchReplies};
use crate::config::ConnectionConfig;
use crate::error::{ErrorCode, IpcError, Result};

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket connected.
    Open,
    /// No socket. The next operation reconnects.
    Disconnected,
    /// A round trip timed out. Every call fails until a new connection is made.
    Terminated,
    /// `close()` was called.
    Closed,
}

impl ConnectionState {
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Open => "open",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Terminated => "terminated",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Link {
    reader: FrameReader<IpcStream>,
    writer: FrameWriter<IpcStream>,
}

impl Link {
    /// Send a request and read its reply, both within `timeout`.
    fn round_trip(
        &mut self,
        timeout: Option<Duration>,
        layout: &[ReplyKind],
        send: impl FnOnce(&mut FrameWriter<IpcStream>) -> pcsx2ipc_frame::Result<()>,
    ) -> pcsx2ipc_frame::Result<Response> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        self.writer.get_mut().set_deadline(deadline);
        self.reader.get_mut().set_deadline(deadline);
        send(&mut self.writer)?;
        self.reader.read_reply(layout)
    }

    fn shutdown(&self) {
        self.writer.get_ref().shutdown();
    }
}

/// A handle to one emulator IPC endpoint.
///
/// Owns the socket; dropping the connection closes it. Every operation
/// records its outcome, readable through [`Connection::last_error`].
pub struct Connection {
    config: ConnectionConfig,
    link: Option<Link>,
    state: ConnectionState,
    last_error: ErrorCode,
    pending: Option<Batch>,
}

impl Connection {
    /// Create a handle without connecting. The first operation connects.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            link: None,
            state: ConnectionState::Disconnected,
            last_error: ErrorCode::Success,
            pending: None,
        }
    }

    /// Create a handle and connect immediately.
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        let mut conn = Self::new(config);
        conn.connect()?;
        Ok(conn)
    }

    /// Connect now if the handle is disconnected. Recorded like any other call.
    pub fn ensure_open(&mut self) -> Result<()> {
        let result = self.ensure_connected();
        self.record(result)
    }

    /// Outcome of the most recent operation.
    pub fn last_error(&self) -> ErrorCode {
        self.last_error
    }

    /// Overwrite the recorded outcome.
    ///
    /// For boundary layers that reject a call before it reaches the connection.
    pub fn set_last_error(&mut self, code: ErrorCode) {
        self.last_error = code;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Read `size` bytes of emulator memory at `address`.
    pub fn read(&mut self, address: u32, size: SizeClass) -> Result<u64> {
        let result = self
            .execute_unrecorded(Command::Read { address, size })
            .and_then(|reply| reply.as_u64().ok_or(IpcError::UnexpectedReply("read")));
        self.record(result)
    }

    /// Write the low `size` bytes of `value` to emulator memory at `address`.
    pub fn write(&mut self, address: u32, size: SizeClass, value: u64) -> Result<()> {
        let result = self
            .execute_unrecorded(Command::Write {
                address,
                size,
                value,
            })
            .map(drop);
        self.record(result)
    }

    /// Emulator version string.
    pub fn version(&mut self) -> Result<String> {
        self.text(Command::Version, "version")
    }

    /// Title of the running game.
    pub fn title(&mut self) -> Result<String> {
        self.text(Command::Title, "title")
    }

    /// Serial of the running game.
    pub fn game_id(&mut self) -> Result<String> {
        self.text(Command::GameId, "game_id")
    }

    /// CRC of the running game's executable.
    pub fn game_uuid(&mut self) -> Result<String> {
        self.text(Command::GameUuid, "game_uuid")
    }

    /// Version of the running game.
    pub fn game_version(&mut self) -> Result<String> {
        self.text(Command::GameVersion, "game_version")
    }

    /// Emulator run state.
    pub fn status(&mut self) -> Result<EmuStatus> {
        let result = self
            .execute_unrecorded(Command::Status)
            .and_then(|reply| reply.as_status().ok_or(IpcError::UnexpectedReply("status")));
        self.record(result)
    }

    /// Save the emulator state to `slot`.
    pub fn save_state(&mut self, slot: u8) -> Result<()> {
        let result = self.execute_unrecorded(Command::SaveState { slot }).map(drop);
        self.record(result)
    }

    /// Load the emulator state from `slot`.
    pub fn load_state(&mut self, slot: u8) -> Result<()> {
        let result = self.execute_unrecorded(Command::LoadState { slot }).map(drop);
        self.record(result)
    }

    /// Send one command as a bare request and return its reply.
    pub fn execute(&mut self, command: Command) -> Result<Reply> {
        let result = self.execute_unrecorded(command);
        self.record(result)
    }

    /// Send `batch` in one round trip.
    ///
    /// Either every reply comes back, in submission order, or the call
    /// fails as a whole.
    pub fn send_batch(&mut self, batch: &Batch) -> Result<BatchReplies> {
        let result = self.send_batch_unrecorded(batch);
        self.record(result)
    }

    /// Start collecting commands into a pending batch, dropping any
    /// batch already pending.
    pub fn begin_batch(&mut self) {
        self.pending = Some(Batch::new(self.config.limits));
        self.last_error = ErrorCode::Success;
    }

    /// Append a command to the pending batch. Returns its reply index.
    pub fn queue(&mut self, command: Command) -> Result<usize> {
        let result = match self.pending.as_mut() {
            Some(batch) => batch.push(command),
            None => Err(IpcError::InvalidArgument("no batch in progress".into())),
        };
        self.record(result)
    }

    /// Whether a pending batch is being collected.
    pub fn has_pending_batch(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending batch, ready to send.
    ///
    /// A poisoned batch is still returned; sending it reports the ceiling
    /// it ran into.
    pub fn finish_batch(&mut self) -> Result<Batch> {
        let result = self
            .pending
            .take()
            .ok_or_else(|| IpcError::InvalidArgument("no batch in progress".into()));
        self.record(result)
    }

    /// Close the socket. Later operations fail with [`IpcError::Closed`].
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if let Some(link) = self.link.take() {
            link.shutdown();
        }
        self.pending = None;
        self.state = ConnectionState::Closed;
        tracing::debug!(endpoint = %self.config.endpoint, "connection closed");
    }

    fn text(&mut self, command: Command, name: &'static str) -> Result<String> {
        let result = self.execute_unrecorded(command).and_then(|reply| match reply {
            Reply::Text(text) => Ok(text),
            _ => Err(IpcError::UnexpectedReply(name)),
        });
        self.record(result)
    }

    fn execute_unrecorded(&mut self, command: Command) -> Result<Reply> {
        if let Some((address, size)) = command.memory_access() {
            if !size.fits_at(address) {
                return Err(IpcError::InvalidAddress { address, size });
            }
        }

        let layout = [command.reply_kind()];
        let mut replies = self.round_trip(&layout, |writer| writer.send_request(&command))?;
        replies
            .pop()
            .ok_or(IpcError::UnexpectedReply(command.opcode().name()))
    }

    fn send_batch_unrecorded(&mut self, batch: &Batch) -> Result<BatchReplies> {
        batch.validate()?;
        self.config.limits.check_batch(batch.commands())?;

        let layout = batch.layout();
        let commands = batch.commands();
        let replies = self.round_trip(&layout, |writer| writer.send_batch(commands))?;
        Ok(BatchReplies::new(replies))
    }

    fn round_trip(
        &mut self,
        layout: &[ReplyKind],
        send: impl FnOnce(&mut FrameWriter<IpcStream>) -> pcsx2ipc_frame::Result<()>,
    ) -> Result<Vec<Reply>> {
        self.ensure_connected()?;
        let Some(link) = self.link.as_mut() else {
            return Err(IpcError::Closed);
        };

        match link.round_trip(self.config.timeout, layout, send) {
            Ok(Response::Ok(replies)) => Ok(replies),
            Ok(Response::Fail) => {
                tracing::debug!(commands = layout.len(), "emulator replied FAIL");
                Err(IpcError::Fail)
            }
            Err(err) if err.is_timeout() => {
                let timeout = self.config.timeout.unwrap_or(Duration::ZERO);
                tracing::warn!(
                    endpoint = %self.config.endpoint,
                    ?timeout,
                    "round trip timed out, terminating connection"
                );
                self.teardown(ConnectionState::Terminated);
                Err(IpcError::Timeout(timeout))
            }
            Err(err) => {
                tracing::warn!(
                    endpoint = %self.config.endpoint,
                    error = %err,
                    "round trip failed, dropping connection"
                );
                self.teardown(ConnectionState::Disconnected);
                Err(err.into())
            }
        }
    }

    fn ensure_connected(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Disconnected => self.connect(),
            ConnectionState::Terminated => Err(IpcError::Terminated),
            ConnectionState::Closed => Err(IpcError::Closed),
        }
    }

    fn connect(&mut self) -> Result<()> {
        tracing::debug!(endpoint = %self.config.endpoint, "connecting to emulator");
        let stream = self.config.endpoint.connect(self.config.timeout)?;
        let reader_stream = stream.try_clone()?;

        let frame_config = self.config.frame_config();
        let reader = FrameReader::with_config_ipc(reader_stream, frame_config.clone())?;
        let writer = FrameWriter::with_config_ipc(stream, frame_config)?;

        self.link = Some(Link { reader, writer });
        self.state = ConnectionState::Open;
        Ok(())
    }

    fn teardown(&mut self, state: ConnectionState) {
        if let Some(link) = self.link.take() {
            link.shutdown();
        }
        self.state = state;
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        self.last_error = match &result {
            Ok(_) => ErrorCode::Success,
            Err(err) => err.code(),
        };
        result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.config.endpoint)
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .finish()
    }
}
