use std::time::Duration;

use clap::{Args, Subcommand};
use pcsx2ipc_frame::SizeClass;
use pcsx2ipc_session::{
    parse_timeout, Connection, ConnectionConfig, ENV_SLOT, ENV_SOCKET, ENV_TIMEOUT_MS,
};
use pcsx2ipc_transport::{Endpoint, DEFAULT_SLOT};

use crate::exit::{ipc_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod memory;
pub mod serve;
pub mod state;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read emulator memory.
    Read(ReadArgs),
    /// Write emulator memory.
    Write(WriteArgs),
    /// Show emulator version, status and the running game.
    Info(InfoArgs),
    /// Save the emulator state to a slot.
    SaveState(StateArgs),
    /// Load the emulator state from a slot.
    LoadState(StateArgs),
    /// Run the in-memory reference server.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, target: &TargetArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Read(args) => memory::read(args, target, format),
        Command::Write(args) => memory::write(args, target, format),
        Command::Info(args) => info::run(args, target, format),
        Command::SaveState(args) => state::save(args, target),
        Command::LoadState(args) => state::load(args, target),
        Command::Serve(args) => serve::run(args, target),
        Command::Version(args) => version::run(args),
    }
}

/// Where the emulator listens and how long to wait for it.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// IPC slot (port) the emulator listens on.
    #[arg(long, env = ENV_SLOT, global = true)]
    pub slot: Option<u16>,

    /// Explicit endpoint: `unix:<path>`, `tcp:<addr>`, or a socket path. Overrides --slot.
    #[arg(long, value_name = "ENDPOINT", env = ENV_SOCKET, global = true)]
    pub socket: Option<String>,

    /// Round-trip timeout (e.g. 5s, 250ms; a bare number is milliseconds, 0 disables).
    #[arg(long, value_name = "DURATION", env = ENV_TIMEOUT_MS, value_parser = parse_timeout, global = true)]
    pub timeout: Option<Duration>,
}

impl TargetArgs {
    pub fn endpoint(&self) -> CliResult<Endpoint> {
        match &self.socket {
            Some(raw) => raw
                .parse::<Endpoint>()
                .map_err(|err| transport_error("invalid --socket", err)),
            None => Ok(Endpoint::for_slot(self.slot.unwrap_or(DEFAULT_SLOT))),
        }
    }

    pub fn config(&self) -> CliResult<ConnectionConfig> {
        let mut config = ConnectionConfig::default().with_endpoint(self.endpoint()?);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(Some(timeout));
        }
        Ok(config)
    }

    pub fn connect(&self) -> CliResult<Connection> {
        let config = self.config()?;
        tracing::debug!(endpoint = %config.endpoint, timeout = ?config.timeout, "connecting");
        Connection::open(config).map_err(|err| ipc_error("connect failed", err))
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Address to read (decimal or 0x-prefixed hex).
    #[arg(value_parser = parse_u32)]
    pub address: u32,
    /// Access width in bits: 8, 16, 32 or 64.
    #[arg(long, short = 's', default_value = "32", value_parser = parse_size)]
    pub size: SizeClass,
    /// Read this many consecutive values in one batch.
    #[arg(long, short = 'n', default_value = "1")]
    pub count: u32,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Address to write (decimal or 0x-prefixed hex).
    #[arg(value_parser = parse_u32)]
    pub address: u32,
    /// Value to write (decimal or 0x-prefixed hex). Truncated to --size.
    #[arg(value_parser = parse_u64)]
    pub value: u64,
    /// Access width in bits: 8, 16, 32 or 64.
    #[arg(long, short = 's', default_value = "32", value_parser = parse_size)]
    pub size: SizeClass,
    /// Read the value back after writing and print it.
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args, Debug, Default)]
pub struct InfoArgs {}

#[derive(Args, Debug)]
pub struct StateArgs {
    /// Save state slot.
    pub slot: u8,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Emulated RAM size in bytes.
    #[arg(long, value_parser = parse_u32)]
    pub ram_size: Option<u32>,
    /// Title reported for the running game.
    #[arg(long, default_value = "")]
    pub title: String,
    /// Serial reported for the running game.
    #[arg(long, default_value = "")]
    pub game_id: String,
    /// CRC reported for the running game.
    #[arg(long, default_value = "")]
    pub game_uuid: String,
    /// Version reported for the running game.
    #[arg(long, default_value = "")]
    pub game_version: String,
    /// Start paused.
    #[arg(long)]
    pub paused: bool,
    /// Drop clients idle this long (e.g. 30s). Default: never.
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub idle_timeout: Option<Duration>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_size(input: &str) -> Result<SizeClass, String> {
    input
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(SizeClass::from_bits)
        .ok_or_else(|| format!("unsupported size {input:?} (expected 8, 16, 32 or 64)"))
}

fn parse_u64(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => input.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|err| format!("invalid number {input:?}: {err}"))
}

fn parse_u32(input: &str) -> Result<u32, String> {
    let value = parse_u64(input)?;
    u32::try_from(value).map_err(|_| format!("{input:?} does not fit in 32 bits"))
}

pub(crate) fn usage(message: impl Into<String>) -> CliError {
    CliError::new(USAGE, message)
}
