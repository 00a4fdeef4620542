use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use pcsx2ipc_session::{Connection, ErrorCode, IpcError};

thread_local! {
    static LAST_MESSAGE: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_MESSAGE.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let message = message.into();
    let sanitized = message.replace('\0', "?");
    LAST_MESSAGE.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

/// Record a boundary-level rejection on the handle.
pub(crate) fn reject(conn: &mut Connection, code: ErrorCode, message: impl Into<String>) {
    set_error_message(message);
    conn.set_last_error(code);
}

/// Fold a connection result into a plain value, keeping the message.
///
/// The connection has already recorded the error code.
pub(crate) fn value_or<T>(result: Result<T, IpcError>, fallback: T) -> T {
    match result {
        Ok(value) => {
            clear_error_state();
            value
        }
        Err(err) => {
            set_error_message(err.to_string());
            fallback
        }
    }
}

pub(crate) fn last_message_ptr() -> *const c_char {
    LAST_MESSAGE.with(|state| state.borrow().as_ptr())
}
