use pcsx2ipc_session::ErrorCode;

use crate::error;
use crate::handle::with_handle;
use crate::types::{Pcsx2IpcHandle, PCSX2IPC_INVALID};

/// Open a batch on `handle`. Later reads and writes with `batch` set are
/// queued on it. Opening again discards the batch being collected.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_initialize_batch(handle: Pcsx2IpcHandle) {
    crate::ffi_boundary((), || {
        with_handle(handle, (), |client| {
            error::clear_error_state();
            client.conn.begin_batch();
        });
    });
}

/// Close the open batch and return its id, or `PCSX2IPC_INVALID` when no
/// batch is open.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_finalize_batch(handle: Pcsx2IpcHandle) -> i32 {
    crate::ffi_boundary(PCSX2IPC_INVALID, || {
        with_handle(handle, PCSX2IPC_INVALID, |client| {
            let Some(batch) = error::value_or(client.conn.finish_batch().map(Some), None) else {
                return PCSX2IPC_INVALID;
            };
            match i32::try_from(client.store_batch(batch)) {
                Ok(id) => id,
                Err(_) => {
                    error::reject(&mut client.conn, ErrorCode::OutOfMemory, "too many batches");
                    PCSX2IPC_INVALID
                }
            }
        })
    })
}

/// Send batch `id` in one round trip. Replies are kept for
/// `pcsx2ipc_get_reply` until the batch is sent again or freed.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_send_batch(handle: Pcsx2IpcHandle, id: i32) {
    crate::ffi_boundary((), || {
        with_handle(handle, (), |client| {
            let Some(stored) = client.batch_mut(id) else {
                error::reject(
                    &mut client.conn,
                    ErrorCode::InvalidArgument,
                    format!("unknown batch id {id}"),
                );
                return;
            };
            let batch = std::mem::take(&mut stored.batch);
            stored.replies = None;

            let result = client.conn.send_batch(&batch);
            if let Some(stored) = client.batch_mut(id) {
                stored.batch = batch;
                stored.replies = error::value_or(result.map(Some), None);
            }
        });
    });
}

/// Integer reply at `index` of sent batch `id`.
///
/// Status replies yield their numeric value. Returns 0 and records
/// `PCSX2IPC_ERR_INVALID_ARGUMENT` for an unknown id, an unsent batch, an
/// out-of-range index, or a reply without an integer payload.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_get_reply(handle: Pcsx2IpcHandle, id: i32, index: u32) -> u64 {
    crate::ffi_boundary(0, || {
        with_handle(handle, 0, |client| {
            let value = client
                .batch_mut(id)
                .and_then(|stored| stored.replies.as_ref())
                .and_then(|replies| replies.value(index as usize));
            match value {
                Some(value) => {
                    error::clear_error_state();
                    client.conn.set_last_error(ErrorCode::Success);
                    value
                }
                None => {
                    error::reject(
                        &mut client.conn,
                        ErrorCode::InvalidArgument,
                        format!("no integer reply {index} for batch {id}"),
                    );
                    0
                }
            }
        })
    })
}

/// Release batch `id`. Its id may be handed out again.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_free_batch(handle: Pcsx2IpcHandle, id: i32) {
    crate::ffi_boundary((), || {
        with_handle(handle, (), |client| {
            if client.free_batch(id) {
                error::clear_error_state();
                client.conn.set_last_error(ErrorCode::Success);
            } else {
                error::reject(
                    &mut client.conn,
                    ErrorCode::InvalidArgument,
                    format!("unknown batch id {id}"),
                );
            }
        });
    });
}
