use std::os::raw::c_char;

use pcsx2ipc_session::{Connection, IpcError};

use crate::args;
use crate::error;
use crate::handle::with_handle;
use crate::types::{Pcsx2IpcHandle, PCSX2IPC_INVALID};

type TextQuery = fn(&mut Connection) -> Result<String, IpcError>;

/// Run a text query and copy the answer into `buf`.
///
/// # Safety
/// If `buf` is non-null it must be writable for `cap` bytes.
unsafe fn text_query(
    handle: Pcsx2IpcHandle,
    buf: *mut c_char,
    cap: usize,
    query: TextQuery,
) -> usize {
    crate::ffi_boundary(0, || {
        with_handle(handle, 0, |client| {
            let text = error::value_or(query(&mut client.conn), String::new());
            // SAFETY: The caller guarantees `buf` is null or writable for `cap` bytes.
            unsafe { args::copy_str_out(&text, buf, cap) }
        })
    })
}

/// Copy the emulator version into `buf`.
///
/// Returns the full length of the text; when it is `>= cap` the copy was
/// truncated. On failure an empty string is written and 0 returned.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
/// If `buf` is non-null it must be writable for `cap` bytes.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_version(
    handle: Pcsx2IpcHandle,
    buf: *mut c_char,
    cap: usize,
) -> usize {
    // SAFETY: Forwarded caller guarantees.
    unsafe { text_query(handle, buf, cap, Connection::version) }
}

/// Copy the running game's title into `buf`. Same conventions as
/// `pcsx2ipc_version`.
///
/// # Safety
/// See `pcsx2ipc_version`.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_title(
    handle: Pcsx2IpcHandle,
    buf: *mut c_char,
    cap: usize,
) -> usize {
    // SAFETY: Forwarded caller guarantees.
    unsafe { text_query(handle, buf, cap, Connection::title) }
}

/// Copy the running game's serial into `buf`.
///
/// # Safety
/// See `pcsx2ipc_version`.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_game_id(
    handle: Pcsx2IpcHandle,
    buf: *mut c_char,
    cap: usize,
) -> usize {
    // SAFETY: Forwarded caller guarantees.
    unsafe { text_query(handle, buf, cap, Connection::game_id) }
}

/// Copy the running game's CRC into `buf`.
///
/// # Safety
/// See `pcsx2ipc_version`.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_game_uuid(
    handle: Pcsx2IpcHandle,
    buf: *mut c_char,
    cap: usize,
) -> usize {
    // SAFETY: Forwarded caller guarantees.
    unsafe { text_query(handle, buf, cap, Connection::game_uuid) }
}

/// Copy the running game's version into `buf`.
///
/// # Safety
/// See `pcsx2ipc_version`.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_game_version(
    handle: Pcsx2IpcHandle,
    buf: *mut c_char,
    cap: usize,
) -> usize {
    // SAFETY: Forwarded caller guarantees.
    unsafe { text_query(handle, buf, cap, Connection::game_version) }
}

/// Emulator run state: `PCSX2IPC_STATUS_RUNNING`, `_PAUSED` or `_SHUTDOWN`,
/// or `PCSX2IPC_INVALID` on failure.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_status(handle: Pcsx2IpcHandle) -> i32 {
    crate::ffi_boundary(PCSX2IPC_INVALID, || {
        with_handle(handle, PCSX2IPC_INVALID, |client| {
            error::value_or(
                client.conn.status().map(|status| status as i32),
                PCSX2IPC_INVALID,
            )
        })
    })
}

/// Save the emulator state to `slot`.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_save_state(handle: Pcsx2IpcHandle, slot: u8) {
    crate::ffi_boundary((), || {
        with_handle(handle, (), |client| {
            error::value_or(client.conn.save_state(slot), ());
        });
    });
}

/// Load the emulator state from `slot`.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_load_state(handle: Pcsx2IpcHandle, slot: u8) {
    crate::ffi_boundary((), || {
        with_handle(handle, (), |client| {
            error::value_or(client.conn.load_state(slot), ());
        });
    });
}
