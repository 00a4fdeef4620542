//! Command opcodes and reply result codes.
//!
//! The opcode is the first byte of every command record.

/// Result byte: command completed.
pub const IPC_OK: u8 = 0x00;

/// Result byte: command failed; the reply carries no payload.
pub const IPC_FAIL: u8 = 0xFF;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Read8 = 0x00,
    Read16 = 0x01,
    Read32 = 0x02,
    Read64 = 0x03,
    Write8 = 0x04,
    Write16 = 0x05,
    Write32 = 0x06,
    Write64 = 0x07,
    Version = 0x08,
    SaveState = 0x09,
    LoadState = 0x0A,
    Title = 0x0B,
    GameId = 0x0C,
    GameUuid = 0x0D,
    GameVersion = 0x0E,
    Status = 0x0F,
    /// Batch header: a `u16` count followed by that many records.
    MultiCommand = 0xFF,
}

impl Opcode {
    /// Decode an opcode byte.
    pub fn from_u8(byte: u8) -> Option<Self> {
        let opcode = match byte {
            0x00 => Opcode::Read8,
            0x01 => Opcode::Read16,
            0x02 => Opcode::Read32,
            0x03 => Opcode::Read64,
            0x04 => Opcode::Write8,
            0x05 => Opcode::Write16,
            0x06 => Opcode::Write32,
            0x07 => Opcode::Write64,
            0x08 => Opcode::Version,
            0x09 => Opcode::SaveState,
            0x0A => Opcode::LoadState,
            0x0B => Opcode::Title,
            0x0C => Opcode::GameId,
            0x0D => Opcode::GameUuid,
            0x0E => Opcode::GameVersion,
            0x0F => Opcode::Status,
            0xFF => Opcode::MultiCommand,
            _ => return None,
        };
        Some(opcode)
    }

    /// Human-readable name for logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Read8 => "read8",
            Opcode::Read16 => "read16",
            Opcode::Read32 => "read32",
            Opcode::Read64 => "read64",
            Opcode::Write8 => "write8",
            Opcode::Write16 => "write16",
            Opcode::Write32 => "write32",
            Opcode::Write64 => "write64",
            Opcode::Version => "version",
            Opcode::SaveState => "save_state",
            Opcode::LoadState => "load_state",
            Opcode::Title => "title",
            Opcode::GameId => "game_id",
            Opcode::GameUuid => "game_uuid",
            Opcode::GameVersion => "game_version",
            Opcode::Status => "status",
            Opcode::MultiCommand => "multi_command",
        }
    }

    /// Returns true for the eight memory access opcodes.
    pub fn is_memory(self) -> bool {
        (self as u8) <= Opcode::Write64 as u8
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        opcode as u8
    }
}
