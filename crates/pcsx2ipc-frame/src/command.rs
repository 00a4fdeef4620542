use std::fmt;

use crate::codec::{ADDRESS_SIZE, TEXT_LENGTH_SIZE};
use crate::opcode::Opcode;

/// Width of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    U8,
    U16,
    U32,
    U64,
}

impl SizeClass {
    pub const ALL: [SizeClass; 4] = [SizeClass::U8, SizeClass::U16, SizeClass::U32, SizeClass::U64];

    /// Access width in bytes.
    pub fn bytes(self) -> usize {
        match self {
            SizeClass::U8 => 1,
            SizeClass::U16 => 2,
            SizeClass::U32 => 4,
            SizeClass::U64 => 8,
        }
    }

    /// Access width in bits.
    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Size class for a width in bits (8, 16, 32 or 64).
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(SizeClass::U8),
            16 => Some(SizeClass::U16),
            32 => Some(SizeClass::U32),
            64 => Some(SizeClass::U64),
            _ => None,
        }
    }

    /// Mask of the bits a value of this width can carry.
    pub fn mask(self) -> u64 {
        match self {
            SizeClass::U64 => u64::MAX,
            other => (1u64 << other.bits()) - 1,
        }
    }

    /// Whether `address .. address + width` stays inside the 32-bit address space.
    pub fn fits_at(self, address: u32) -> bool {
        u64::from(address) + self.bytes() as u64 <= 1u64 << 32
    }

    pub fn read_opcode(self) -> Opcode {
        match self {
            SizeClass::U8 => Opcode::Read8,
            SizeClass::U16 => Opcode::Read16,
            SizeClass::U32 => Opcode::Read32,
            SizeClass::U64 => Opcode::Read64,
        }
    }

    pub fn write_opcode(self) -> Opcode {
        match self {
            SizeClass::U8 => Opcode::Write8,
            SizeClass::U16 => Opcode::Write16,
            SizeClass::U32 => Opcode::Write32,
            SizeClass::U64 => Opcode::Write64,
        }
    }

    /// Size class of a memory opcode. `None` for non-memory opcodes.
    pub fn of_opcode(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::Read8 | Opcode::Write8 => Some(SizeClass::U8),
            Opcode::Read16 | Opcode::Write16 => Some(SizeClass::U16),
            Opcode::Read32 | Opcode::Write32 => Some(SizeClass::U32),
            Opcode::Read64 | Opcode::Write64 => Some(SizeClass::U64),
            _ => None,
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.bits())
    }
}

/// Emulator run state reported by the Status command.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmuStatus {
    Running = 0,
    Paused = 1,
    Shutdown = 2,
}

impl EmuStatus {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(EmuStatus::Running),
            1 => Some(EmuStatus::Paused),
            2 => Some(EmuStatus::Shutdown),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EmuStatus::Running => "running",
            EmuStatus::Paused => "paused",
            EmuStatus::Shutdown => "shutdown",
        }
    }
}

/// One operation inside a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Read { address: u32, size: SizeClass },
    /// Only the low `size` bytes of `value` are sent.
    Write { address: u32, size: SizeClass, value: u64 },
    Version,
    SaveState { slot: u8 },
    LoadState { slot: u8 },
    Title,
    GameId,
    GameUuid,
    GameVersion,
    Status,
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Read { size, .. } => size.read_opcode(),
            Command::Write { size, .. } => size.write_opcode(),
            Command::Version => Opcode::Version,
            Command::SaveState { .. } => Opcode::SaveState,
            Command::LoadState { .. } => Opcode::LoadState,
            Command::Title => Opcode::Title,
            Command::GameId => Opcode::GameId,
            Command::GameUuid => Opcode::GameUuid,
            Command::GameVersion => Opcode::GameVersion,
            Command::Status => Opcode::Status,
        }
    }

    /// Encoded record length, opcode included.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Command::Read { .. } => ADDRESS_SIZE,
            Command::Write { size, .. } => ADDRESS_SIZE + size.bytes(),
            Command::SaveState { .. } | Command::LoadState { .. } => 1,
            _ => 0,
        }
    }

    /// Shape of this command's reply payload.
    pub fn reply_kind(&self) -> ReplyKind {
        match self {
            Command::Read { size, .. } => ReplyKind::Value(*size),
            Command::Write { .. } | Command::SaveState { .. } | Command::LoadState { .. } => {
                ReplyKind::Empty
            }
            Command::Version
            | Command::Title
            | Command::GameId
            | Command::GameUuid
            | Command::GameVersion => ReplyKind::Text,
            Command::Status => ReplyKind::Status,
        }
    }

    /// Memory address touched by the command, with its width.
    pub fn memory_access(&self) -> Option<(u32, SizeClass)> {
        match self {
            Command::Read { address, size } | Command::Write { address, size, .. } => {
                Some((*address, *size))
            }
            _ => None,
        }
    }
}

/// Shape of one command's reply payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// No payload.
    Empty,
    /// Little-endian integer of the given width.
    Value(SizeClass),
    /// `u32` length followed by that many bytes, NUL-terminated.
    Text,
    /// `u32` emulator status.
    Status,
}

impl ReplyKind {
    /// Bytes this reply needs at minimum. Text replies may be longer.
    pub fn min_len(self) -> usize {
        match self {
            ReplyKind::Empty => 0,
            ReplyKind::Value(size) => size.bytes(),
            ReplyKind::Text => TEXT_LENGTH_SIZE,
            ReplyKind::Status => 4,
        }
    }
}

/// One decoded reply, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Done,
    Value(u64),
    Text(String),
    Status(EmuStatus),
}

impl Reply {
    /// Integer payload; status replies map to their wire value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Reply::Value(value) => Some(*value),
            Reply::Status(status) => Some(*status as u64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<EmuStatus> {
        match self {
            Reply::Status(status) => Some(*status),
            _ => None,
        }
    }
}
