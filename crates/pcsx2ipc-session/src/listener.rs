use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use pcsx2ipc_frame::{
    reply_layout, Command, FrameConfig, FrameError, FrameReader, FrameWriter, Limits, Response,
};
use pcsx2ipc_transport::{Endpoint, IpcStream, Listener};

use crate::backend::EmulatorBackend;
use crate::error::{IpcError, Result};

/// Server-side settings.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Request and reply size ceilings.
    pub limits: Limits,
    /// Drop clients that stay silent this long. `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

/// Reference PCSX2 IPC server.
///
/// Answers the protocol from an [`EmulatorBackend`], one thread per client.
/// Commands from all clients run against the same backend, one request at
/// a time.
pub struct IpcServer<B> {
    listener: Listener,
    backend: Arc<Mutex<B>>,
    config: ServerConfig,
    next_client_id: AtomicU64,
}

impl<B: EmulatorBackend + 'static> IpcServer<B> {
    /// Bind at `endpoint`.
    pub fn bind(endpoint: &Endpoint, backend: B) -> Result<Self> {
        let listener = Listener::bind(endpoint)?;
        tracing::info!(endpoint = %listener.endpoint(), "IPC server listening");
        Ok(Self {
            listener,
            backend: Arc::new(Mutex::new(backend)),
            config: ServerConfig::default(),
            next_client_id: AtomicU64::new(1),
        })
    }

    /// Override server config.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// The endpoint clients should connect to.
    pub fn endpoint(&self) -> Endpoint {
        self.listener.endpoint()
    }

    /// Shared handle to the backend.
    pub fn backend(&self) -> Arc<Mutex<B>> {
        Arc::clone(&self.backend)
    }

    /// Accept one client and serve it on this thread until it disconnects.
    pub fn serve_one(&self) -> Result<()> {
        let stream = self.listener.accept()?;
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        log_client(id, &stream);
        serve_client(stream, &self.backend, &self.config)
    }

    /// Accept clients until `running` turns false, serving each on its own thread.
    ///
    /// `running` is checked between accepts.
    pub fn serve(&self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            let stream = self.listener.accept()?;
            if !running.load(Ordering::SeqCst) {
                break;
            }

            let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
            log_client(id, &stream);
            let backend = Arc::clone(&self.backend);
            let config = self.config.clone();
            std::thread::Builder::new()
                .name(format!("pcsx2ipc-client-{id}"))
                .spawn(move || {
                    if let Err(err) = serve_client(stream, &backend, &config) {
                        tracing::warn!(client = id, error = %err, "client session ended with error");
                    } else {
                        tracing::debug!(client = id, "client disconnected");
                    }
                })
                .map_err(|err| IpcError::Transport(err.into()))?;
        }
        Ok(())
    }
}

fn log_client(id: u64, stream: &IpcStream) {
    match stream.peer_credentials() {
        Some((uid, _, pid)) => tracing::debug!(
            client = id,
            transport = stream.transport_name(),
            uid,
            pid,
            "client connected"
        ),
        None => tracing::debug!(client = id, transport = stream.transport_name(), "client connected"),
    }
}

/// Serve one client until it disconnects.
///
/// Malformed requests are answered with FAIL and end the session, since the
/// stream position can no longer be trusted.
pub fn serve_client<B: EmulatorBackend>(
    stream: IpcStream,
    backend: &Mutex<B>,
    config: &ServerConfig,
) -> Result<()> {
    let reader_stream = stream.try_clone()?;
    let frame_config = FrameConfig {
        limits: config.limits,
        read_timeout: config.idle_timeout,
        write_timeout: None,
    };
    let mut reader = FrameReader::with_config_ipc(reader_stream, frame_config.clone())?;
    let mut writer = FrameWriter::with_config_ipc(stream, frame_config)?;

    loop {
        let commands = match reader.read_request() {
            Ok(commands) => commands,
            Err(FrameError::ConnectionClosed) => return Ok(()),
            Err(
                err @ (FrameError::UnknownOpcode(_)
                | FrameError::NestedBatch
                | FrameError::EmptyRequest
                | FrameError::RequestTooLarge { .. }
                | FrameError::TooManyCommands { .. }),
            ) => {
                tracing::warn!(error = %err, "rejecting malformed request");
                if let Err(send_err) = writer.send_reply(&Response::Fail, &[]) {
                    tracing::debug!(error = %send_err, "failed sending FAIL reply");
                }
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let layout = reply_layout(&commands);
        let response = execute(backend, &commands);
        match writer.send_reply(&response, &layout) {
            Ok(()) => {}
            Err(FrameError::ReplyTooLarge { size, max }) => {
                tracing::warn!(size, max, "reply exceeds ceiling, answering FAIL");
                writer.send_reply(&Response::Fail, &layout)?;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn execute<B: EmulatorBackend>(backend: &Mutex<B>, commands: &[Command]) -> Response {
    let mut backend = backend.lock().unwrap_or_else(PoisonError::into_inner);
    let mut replies = Vec::with_capacity(commands.len());
    for (index, command) in commands.iter().enumerate() {
        match backend.execute(command) {
            Ok(reply) => replies.push(reply),
            Err(fault) => {
                tracing::debug!(
                    index,
                    opcode = command.opcode().name(),
                    %fault,
                    "command failed"
                );
                return Response::Fail;
            }
        }
    }
    Response::Ok(replies)
}
