use std::ffi::c_void;

use pcsx2ipc_session::{Batch, BatchReplies, Connection, ErrorCode};

pub const PCSX2IPC_SUCCESS: i32 = ErrorCode::Success as i32;
pub const PCSX2IPC_ERR_FAIL: i32 = ErrorCode::Fail as i32;
pub const PCSX2IPC_ERR_OUT_OF_MEMORY: i32 = ErrorCode::OutOfMemory as i32;
pub const PCSX2IPC_ERR_UNIMPLEMENTED: i32 = ErrorCode::Unimplemented as i32;
pub const PCSX2IPC_ERR_UNKNOWN: i32 = ErrorCode::Unknown as i32;
pub const PCSX2IPC_ERR_CONNECTION: i32 = ErrorCode::Connection as i32;
pub const PCSX2IPC_ERR_FRAME: i32 = ErrorCode::Frame as i32;
pub const PCSX2IPC_ERR_TIMEOUT: i32 = ErrorCode::Timeout as i32;
pub const PCSX2IPC_ERR_INVALID_ADDRESS: i32 = ErrorCode::InvalidAddress as i32;
pub const PCSX2IPC_ERR_INVALID_ARGUMENT: i32 = ErrorCode::InvalidArgument as i32;

pub const PCSX2IPC_STATUS_RUNNING: i32 = 0;
pub const PCSX2IPC_STATUS_PAUSED: i32 = 1;
pub const PCSX2IPC_STATUS_SHUTDOWN: i32 = 2;

/// Returned in place of a batch id or status when the call failed.
pub const PCSX2IPC_INVALID: i32 = -1;

/// Opaque handle. Never dereferenced by the caller.
pub type Pcsx2IpcHandle = *mut c_void;

pub(crate) struct StoredBatch {
    pub(crate) batch: Batch,
    pub(crate) replies: Option<BatchReplies>,
}

pub(crate) struct ClientHandle {
    pub(crate) conn: Connection,
    /// Finalized batches; the id is the index. Freed slots are reused.
    pub(crate) batches: Vec<Option<StoredBatch>>,
}

impl ClientHandle {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn,
            batches: Vec::new(),
        }
    }

    pub(crate) fn store_batch(&mut self, batch: Batch) -> usize {
        let stored = StoredBatch {
            batch,
            replies: None,
        };
        match self.batches.iter().position(Option::is_none) {
            Some(id) => {
                self.batches[id] = Some(stored);
                id
            }
            None => {
                self.batches.push(Some(stored));
                self.batches.len() - 1
            }
        }
    }

    pub(crate) fn batch_mut(&mut self, id: i32) -> Option<&mut StoredBatch> {
        let id = usize::try_from(id).ok()?;
        self.batches.get_mut(id)?.as_mut()
    }

    pub(crate) fn free_batch(&mut self, id: i32) -> bool {
        match usize::try_from(id).ok().and_then(|id| self.batches.get_mut(id)) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}
