use std::collections::BTreeMap;
use std::os::raw::c_char;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pcsx2ipc_session::{Connection, ConnectionConfig};
use pcsx2ipc_transport::Endpoint;

use crate::args;
use crate::error;
use crate::types::{ClientHandle, Pcsx2IpcHandle, PCSX2IPC_ERR_INVALID_ARGUMENT};

/// Live handles by id. Ids are never reused, so a destroyed handle stays
/// invalid even after later creates.
struct Registry {
    next_id: usize,
    handles: BTreeMap<usize, Arc<Mutex<ClientHandle>>>,
}

static REGISTRY: Mutex<Registry> = Mutex::new(Registry {
    next_id: 1,
    handles: BTreeMap::new(),
});

fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn with_handle<T>(
    handle: Pcsx2IpcHandle,
    on_error: T,
    f: impl FnOnce(&mut ClientHandle) -> T,
) -> T {
    if handle.is_null() {
        error::set_error_message("handle cannot be null");
        return on_error;
    }

    let Some(client) = registry().handles.get(&(handle as usize)).cloned() else {
        error::set_error_message("handle is not live");
        return on_error;
    };

    let mut client = client.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut client)
}

fn register(conn: Connection) -> Pcsx2IpcHandle {
    let mut registry = registry();
    let id = registry.next_id;
    registry.next_id += 1;
    registry
        .handles
        .insert(id, Arc::new(Mutex::new(ClientHandle::new(conn))));
    id as Pcsx2IpcHandle
}

/// Wrap `config` in a handle and try to connect.
///
/// A failed connect still yields a handle; its last error says why, and
/// the next call retries.
fn create_with(config: ConnectionConfig) -> Pcsx2IpcHandle {
    let mut conn = Connection::new(config);
    error::value_or(conn.ensure_open(), ());
    register(conn)
}

/// Create a handle for the default endpoint.
///
/// `PCSX2_IPC_SLOT`, `PCSX2_IPC_SOCKET` and `PCSX2_IPC_TIMEOUT_MS` override
/// the defaults. Returns null only when those variables are malformed.
#[no_mangle]
pub extern "C" fn pcsx2ipc_create() -> Pcsx2IpcHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();
        match ConnectionConfig::from_env() {
            Ok(config) => create_with(config),
            Err(err) => {
                error::set_error_message(err.to_string());
                std::ptr::null_mut()
            }
        }
    })
}

/// Create a handle for the emulator listening on `slot`.
#[no_mangle]
pub extern "C" fn pcsx2ipc_create_slot(slot: u16) -> Pcsx2IpcHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();
        create_with(ConnectionConfig::for_slot(slot))
    })
}

/// Create a handle for an explicit endpoint: `unix:<path>`, `tcp:<addr>`,
/// a bare socket address, or a bare path. `timeout_ms == 0` disables the
/// timeout.
///
/// Returns null if `endpoint` is null, not UTF-8, or unparsable.
///
/// # Safety
/// `endpoint` must be null or point to a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_create_at(
    endpoint: *const c_char,
    timeout_ms: u32,
) -> Pcsx2IpcHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let endpoint = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(endpoint, "endpoint") } {
                Some(v) => v,
                None => return std::ptr::null_mut(),
            }
        };
        let endpoint = match endpoint.parse::<Endpoint>() {
            Ok(endpoint) => endpoint,
            Err(err) => {
                error::set_error_message(err.to_string());
                return std::ptr::null_mut();
            }
        };

        let timeout = (timeout_ms > 0)
            .then(|| std::time::Duration::from_millis(u64::from(timeout_ms)));
        create_with(
            ConnectionConfig::default()
                .with_endpoint(endpoint)
                .with_timeout(timeout),
        )
    })
}

/// Close the connection and free the handle.
///
/// Null, already-destroyed and unknown handles are ignored.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_destroy(handle: Pcsx2IpcHandle) {
    crate::ffi_boundary((), || {
        if handle.is_null() {
            return;
        }
        let Some(client) = registry().handles.remove(&(handle as usize)) else {
            return;
        };

        let mut client = client.lock().unwrap_or_else(PoisonError::into_inner);
        client.conn.close();
    });
}

/// Error code of the most recent call on `handle`.
///
/// Null or destroyed handles report `PCSX2IPC_ERR_INVALID_ARGUMENT`.
///
/// # Safety
/// `handle` must be null or a value returned by one of the create functions.
#[no_mangle]
pub unsafe extern "C" fn pcsx2ipc_last_error(handle: Pcsx2IpcHandle) -> i32 {
    crate::ffi_boundary(PCSX2IPC_ERR_INVALID_ARGUMENT, || {
        with_handle(handle, PCSX2IPC_ERR_INVALID_ARGUMENT, |client| {
            i32::from(client.conn.last_error())
        })
    })
}
