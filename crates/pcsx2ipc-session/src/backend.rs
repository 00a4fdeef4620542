//! Emulator side of the protocol, used by the reference server.

use std::collections::HashMap;

use pcsx2ipc_frame::{Command, EmuStatus, Reply, SizeClass};

/// Size of the PS2 EE main memory.
pub const EE_RAM_SIZE: usize = 32 * 1024 * 1024;

/// Why an emulator refused a command. Any fault fails the whole request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendFault {
    #[error("address {address:#010x} out of range for {size} access")]
    OutOfRange { address: u32, size: SizeClass },

    #[error("no game is running")]
    NotRunning,

    #[error("save slot {0} is empty")]
    EmptySlot(u8),
}

pub type BackendResult<T> = std::result::Result<T, BackendFault>;

/// What an IPC server needs from an emulator.
pub trait EmulatorBackend: Send {
    fn read(&mut self, address: u32, size: SizeClass) -> BackendResult<u64>;
    fn write(&mut self, address: u32, size: SizeClass, value: u64) -> BackendResult<()>;
    fn version(&self) -> String;
    fn status(&self) -> EmuStatus;
    fn title(&self) -> BackendResult<String>;
    fn game_id(&self) -> BackendResult<String>;
    fn game_uuid(&self) -> BackendResult<String>;
    fn game_version(&self) -> BackendResult<String>;
    fn save_state(&mut self, slot: u8) -> BackendResult<()>;
    fn load_state(&mut self, slot: u8) -> BackendResult<()>;

    /// Run one command.
    fn execute(&mut self, command: &Command) -> BackendResult<Reply> {
        let reply = match *command {
            Command::Read { address, size } => Reply::Value(self.read(address, size)?),
            Command::Write {
                address,
                size,
                value,
            } => {
                self.write(address, size, value)?;
                Reply::Done
            }
            Command::Version => Reply::Text(self.version()),
            Command::SaveState { slot } => {
                self.save_state(slot)?;
                Reply::Done
            }
            Command::LoadState { slot } => {
                self.load_state(slot)?;
                Reply::Done
            }
            Command::Title => Reply::Text(self.title()?),
            Command::GameId => Reply::Text(self.game_id()?),
            Command::GameUuid => Reply::Text(self.game_uuid()?),
            Command::GameVersion => Reply::Text(self.game_version()?),
            Command::Status => Reply::Status(self.status()),
        };
        Ok(reply)
    }
}

/// Metadata of the game loaded into a [`MemoryEmulator`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameInfo {
    pub title: String,
    pub id: String,
    pub uuid: String,
    pub version: String,
}

/// An emulator that is nothing but EE RAM and some metadata.
///
/// Memory accesses are little-endian. Save states snapshot the whole RAM.
pub struct MemoryEmulator {
    ram: Vec<u8>,
    status: EmuStatus,
    game: GameInfo,
    states: HashMap<u8, Vec<u8>>,
}

impl Default for MemoryEmulator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEmulator {
    /// A running emulator with zeroed RAM and no game metadata.
    pub fn new() -> Self {
        Self::with_ram_size(EE_RAM_SIZE)
    }

    /// Same as [`MemoryEmulator::new`] with a smaller or larger RAM.
    pub fn with_ram_size(size: usize) -> Self {
        Self {
            ram: vec![0; size],
            status: EmuStatus::Running,
            game: GameInfo::default(),
            states: HashMap::new(),
        }
    }

    pub fn with_game(mut self, game: GameInfo) -> Self {
        self.game = game;
        self
    }

    pub fn with_status(mut self, status: EmuStatus) -> Self {
        self.status = status;
        self
    }

    pub fn set_status(&mut self, status: EmuStatus) {
        self.status = status;
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    fn range(&self, address: u32, size: SizeClass) -> BackendResult<std::ops::Range<usize>> {
        let start = address as usize;
        match start.checked_add(size.bytes()) {
            Some(end) if end <= self.ram.len() => Ok(start..end),
            _ => Err(BackendFault::OutOfRange { address, size }),
        }
    }

    fn running(&self) -> BackendResult<()> {
        match self.status {
            EmuStatus::Shutdown => Err(BackendFault::NotRunning),
            EmuStatus::Running | EmuStatus::Paused => Ok(()),
        }
    }
}

impl EmulatorBackend for MemoryEmulator {
    fn read(&mut self, address: u32, size: SizeClass) -> BackendResult<u64> {
        self.running()?;
        let range = self.range(address, size)?;
        let mut bytes = [0u8; 8];
        bytes[..size.bytes()].copy_from_slice(&self.ram[range]);
        Ok(u64::from_le_bytes(bytes))
    }

    fn write(&mut self, address: u32, size: SizeClass, value: u64) -> BackendResult<()> {
        self.running()?;
        let range = self.range(address, size)?;
        let bytes = (value & size.mask()).to_le_bytes();
        self.ram[range].copy_from_slice(&bytes[..size.bytes()]);
        Ok(())
    }

    fn version(&self) -> String {
        format!("pcsx2ipc reference server {}", env!("CARGO_PKG_VERSION"))
    }

    fn status(&self) -> EmuStatus {
        self.status
    }

    fn title(&self) -> BackendResult<String> {
        self.running()?;
        Ok(self.game.title.clone())
    }

    fn game_id(&self) -> BackendResult<String> {
        self.running()?;
        Ok(self.game.id.clone())
    }

    fn game_uuid(&self) -> BackendResult<String> {
        self.running()?;
        Ok(self.game.uuid.clone())
    }

    fn game_version(&self) -> BackendResult<String> {
        self.running()?;
        Ok(self.game.version.clone())
    }

    fn save_state(&mut self, slot: u8) -> BackendResult<()> {
        self.running()?;
        self.states.insert(slot, self.ram.clone());
        Ok(())
    }

    fn load_state(&mut self, slot: u8) -> BackendResult<()> {
        self.running()?;
        let state = self.states.get(&slot).ok_or(BackendFault::EmptySlot(slot))?;
        self.ram.copy_from_slice(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_every_width() {
        let mut emu = MemoryEmulator::with_ram_size(64);
        for size in SizeClass::ALL {
            let value = 0x0102_0304_0506_0708 & size.mask();
            emu.write(8, size, value).unwrap();
            assert_eq!(emu.read(8, size).unwrap(), value);
        }
    }

    #[test]
    fn memory_is_little_endian() {
        let mut emu = MemoryEmulator::with_ram_size(16);
        emu.write(0, SizeClass::U32, 0xDEAD_BEEF).unwrap();
        assert_eq!(&emu.ram()[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(emu.read(0, SizeClass::U16).unwrap(), 0xBEEF);
        assert_eq!(emu.read(2, SizeClass::U8).unwrap(), 0xAD);
    }

    #[test]
    fn wide_values_are_truncated() {
        let mut emu = MemoryEmulator::with_ram_size(16);
        emu.write(0, SizeClass::U8, 0x1234).unwrap();
        assert_eq!(emu.read(0, SizeClass::U16).unwrap(), 0x34);
    }

    #[test]
    fn out_of_range_access_faults() {
        let mut emu = MemoryEmulator::with_ram_size(16);
        assert!(emu.read(15, SizeClass::U8).is_ok());
        assert_eq!(
            emu.read(15, SizeClass::U16),
            Err(BackendFault::OutOfRange {
                address: 15,
                size: SizeClass::U16
            })
        );
        assert!(emu.write(u32::MAX, SizeClass::U8, 0).is_err());
    }

    #[test]
    fn save_and_load_state() {
        let mut emu = MemoryEmulator::with_ram_size(16);
        emu.write(0, SizeClass::U8, 1).unwrap();
        emu.save_state(3).unwrap();
        emu.write(0, SizeClass::U8, 2).unwrap();
        emu.load_state(3).unwrap();
        assert_eq!(emu.read(0, SizeClass::U8).unwrap(), 1);
        assert_eq!(emu.load_state(4), Err(BackendFault::EmptySlot(4)));
    }

    #[test]
    fn shutdown_emulator_refuses_game_commands() {
        let mut emu = MemoryEmulator::with_ram_size(16).with_status(EmuStatus::Shutdown);
        assert_eq!(emu.read(0, SizeClass::U8), Err(BackendFault::NotRunning));
        assert_eq!(emu.title(), Err(BackendFault::NotRunning));
        assert_eq!(emu.status(), EmuStatus::Shutdown);
        assert!(emu.version().starts_with("pcsx2ipc reference server"));
    }

    #[test]
    fn execute_dispatches_commands() {
        let mut emu = MemoryEmulator::with_ram_size(16).with_game(GameInfo {
            title: "Okami".into(),
            id: "SLUS-21115".into(),
            uuid: "6F2A4A70".into(),
            version: "1.01".into(),
        });
        assert_eq!(emu.execute(&Command::GameId).unwrap(), Reply::Text("SLUS-21115".into()));
        assert_eq!(
            emu.execute(&Command::Status).unwrap(),
            Reply::Status(EmuStatus::Running)
        );
        assert_eq!(
            emu.execute(&Command::Write {
                address: 4,
                size: SizeClass::U16,
                value: 9
            })
            .unwrap(),
            Reply::Done
        );
        assert_eq!(
            emu.execute(&Command::Read {
                address: 4,
                size: SizeClass::U16
            })
            .unwrap(),
            Reply::Value(9)
        );
    }
}
