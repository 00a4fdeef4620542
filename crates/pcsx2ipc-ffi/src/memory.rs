use pcsx2ipc_frame::Command;
use pcsx2ipc_session::ErrorCode;

use crate::args;
use crate::error;
use crate::handle::with_handle;
use crate::types::Pcsx2IpcHandle;

/// Read `size_bits` (8, 16, 32 or 64) of emulator memory at `address`.
///
/// With `batch` set the read is queued on the open batch and the return
/// value is its reply index. Returns 0 on failure; check
/// `pcsx2ipc_last_error`.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_read(
    handle: Pcsx2IpcHandle,
    address: u32,
    size_bits: u32,
    batch: bool,
) -> u64 {
    crate::ffi_boundary(0, || {
        with_handle(handle, 0, |client| {
            let Some(size) = args::size_arg(size_bits) else {
                error::reject(
                    &mut client.conn,
                    ErrorCode::InvalidAddress,
                    format!("unsupported access width: {size_bits} bits"),
                );
                return 0;
            };

            if batch {
                let queued = client.conn.queue(Command::Read { address, size });
                error::value_or(queued.map(|index| index as u64), 0)
            } else {
                error::value_or(client.conn.read(address, size), 0)
            }
        })
    })
}

/// Write the low `size_bits` of `value` to emulator memory at `address`.
///
/// With `batch` set the write is queued on the open batch.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_write(
    handle: Pcsx2IpcHandle,
    address: u32,
    size_bits: u32,
    value: u64,
    batch: bool,
) {
    crate::ffi_boundary((), || {
        with_handle(handle, (), |client| {
            let Some(size) = args::size_arg(size_bits) else {
                error::reject(
                    &mut client.conn,
                    ErrorCode::InvalidAddress,
                    format!("unsupported access width: {size_bits} bits"),
                );
                return;
            };

            if batch {
                let queued = client.conn.queue(Command::Write {
                    address,
                    size,
                    value,
                });
                error::value_or(queued.map(drop), ());
            } else {
                error::value_or(client.conn.write(address, size, value), ());
            }
        });
    });
}
