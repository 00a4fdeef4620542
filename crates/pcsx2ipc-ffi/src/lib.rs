//! pcsx2ipc-ffi: C-ABI exports for the PCSX2 IPC client.
//!
//! Every call records its outcome on the handle; read it back with
//! `pcsx2ipc_last_error`. A human-readable message for the most recent
//! failure on the calling thread is available from
//! `pcsx2ipc_last_error_message`.

mod args;
mod batch;
mod error;
mod handle;
mod info;
mod memory;
mod types;

use std::panic::AssertUnwindSafe;

pub use batch::{
    pcsx2ipc_finalize_batch, pcsx2ipc_free_batch, pcsx2ipc_get_reply, pcsx2ipc_initialize_batch,
    pcsx2ipc_send_batch,
};
pub use handle::{
    pcsx2ipc_create, pcsx2ipc_create_at, pcsx2ipc_create_slot, pcsx2ipc_destroy,
    pcsx2ipc_last_error,
};
pub use info::{
    pcsx2ipc_game_id, pcsx2ipc_game_uuid, pcsx2ipc_game_version, pcsx2ipc_load_state,
    pcsx2ipc_save_state, pcsx2ipc_status, pcsx2ipc_title, pcsx2ipc_version,
};
pub use memory::{pcsx2ipc_read, pcsx2ipc_write};
pub use types::{
    Pcsx2IpcHandle, PCSX2IPC_ERR_CONNECTION, PCSX2IPC_ERR_FAIL, PCSX2IPC_ERR_FRAME,
    PCSX2IPC_ERR_INVALID_ADDRESS, PCSX2IPC_ERR_INVALID_ARGUMENT, PCSX2IPC_ERR_OUT_OF_MEMORY,
    PCSX2IPC_ERR_TIMEOUT, PCSX2IPC_ERR_UNIMPLEMENTED, PCSX2IPC_ERR_UNKNOWN, PCSX2IPC_INVALID,
    PCSX2IPC_STATUS_PAUSED, PCSX2IPC_STATUS_RUNNING, PCSX2IPC_STATUS_SHUTDOWN, PCSX2IPC_SUCCESS,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Message for the most recent failure on this thread, or an empty string.
///
/// The pointer stays valid until the next call on the same thread.
#[no_mangle]
pub extern "C" fn pcsx2ipc_last_error_message() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_message_ptr)
}
