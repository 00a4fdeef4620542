use std::ffi::CStr;
use std::os::raw::c_char;

use pcsx2ipc_frame::SizeClass;

use crate::error;

/// Convert a required C string argument into UTF-8 `&str`.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn required_str_arg<'a>(value: *const c_char, name: &str) -> Option<&'a str> {
    if value.is_null() {
        error::set_error_message(format!("{name} cannot be null"));
        return None;
    }

    let as_cstr = {
        // SAFETY: The caller guarantees `value` points to a valid NUL-terminated C string.
        unsafe { CStr::from_ptr(value) }
    };

    match as_cstr.to_str() {
        Ok(v) => Some(v),
        Err(_) => {
            error::set_error_message(format!("{name} must be valid UTF-8"));
            None
        }
    }
}

/// Size class for an access width in bits (8, 16, 32, 64).
pub(crate) fn size_arg(bits: u32) -> Option<SizeClass> {
    SizeClass::from_bits(bits)
}

/// Copy `text` into a caller buffer as a NUL-terminated string.
///
/// Truncates to `cap - 1` bytes. Returns the full length of `text` so the
/// caller can detect truncation; a null `buf` or zero `cap` only queries it.
///
/// # Safety
/// If `buf` is non-null it must be writable for `cap` bytes.
pub(crate) unsafe fn copy_str_out(text: &str, buf: *mut c_char, cap: usize) -> usize {
    let bytes = text.as_bytes();
    if buf.is_null() || cap == 0 {
        return bytes.len();
    }

    let n = bytes.len().min(cap - 1);
    // SAFETY: `buf` is writable for `cap` bytes and `n + 1 <= cap`.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), n);
        *buf.add(n) = 0;
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_fits() {
        let mut buf = [0x7F as c_char; 16];
        // SAFETY: buffer is 16 bytes.
        let len = unsafe { copy_str_out("SLES-50330", buf.as_mut_ptr(), buf.len()) };
        assert_eq!(len, 10);
        // SAFETY: copy_str_out NUL-terminates.
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "SLES-50330");
    }

    #[test]
    fn copy_truncates_and_terminates() {
        let mut buf = [0x7F as c_char; 5];
        // SAFETY: buffer is 5 bytes.
        let len = unsafe { copy_str_out("SLES-50330", buf.as_mut_ptr(), buf.len()) };
        assert_eq!(len, 10);
        // SAFETY: copy_str_out NUL-terminates.
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "SLES");
    }

    #[test]
    fn null_buffer_queries_length() {
        // SAFETY: null buffer is never written.
        let len = unsafe { copy_str_out("PCSX2", std::ptr::null_mut(), 64) };
        assert_eq!(len, 5);
    }

    #[test]
    fn null_string_argument_rejected() {
        // SAFETY: null is an accepted input.
        assert!(unsafe { required_str_arg(std::ptr::null(), "endpoint") }.is_none());
        // SAFETY: the message pointer is a live thread-local CString.
        let message = unsafe { CStr::from_ptr(error::last_message_ptr()) };
        assert_eq!(message.to_str().unwrap(), "endpoint cannot be null");
    }

    #[test]
    fn size_bits() {
        assert_eq!(size_arg(32), Some(SizeClass::U32));
        assert_eq!(size_arg(12), None);
    }
}
