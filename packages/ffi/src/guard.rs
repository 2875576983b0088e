//! Helpers shared by every exported function: panic containment, error
//! recording and argument conversion.

use std::any::Any;
use std::ffi::{c_char, CStr, CString};
use std::panic::{self, AssertUnwindSafe};

use renterbind_core::{BindingError, BufferRef, ContextKey};

use crate::error::{FfiError, Result};
use crate::state::ERRORS;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `body` for the exported function `operation`.
///
/// On failure (or panic) the error is recorded in the slot for `ctx` as
/// `operation: cause` and `sentinel` is returned.
pub(crate) fn guarded<T>(
    ctx: usize,
    operation: &'static str,
    sentinel: T,
    body: impl FnOnce() -> Result<T>,
) -> T {
    let error = match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => return value,
        Ok(Err(e)) => e,
        Err(payload) => FfiError::from(BindingError::Panicked(panic_message(payload.as_ref()))),
    };
    ERRORS.record(ContextKey::from_raw(ctx), operation, &error);
    sentinel
}

/// Borrow a NUL-terminated UTF-8 string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn c_str<'a>(ptr: *const c_char, what: &'static str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(BindingError::NullPointer(what).into());
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| BindingError::InvalidString(what).into())
}

/// Hand a string to the caller, who frees it with `us_string_free`.
pub(crate) fn into_c_string(text: String) -> Result<*mut c_char> {
    CString::new(text)
        .map(CString::into_raw)
        .map_err(|_| BindingError::InvalidArgument("string contains a NUL byte".into()).into())
}

/// Copy `N` bytes from a caller-supplied fixed-size array.
///
/// # Safety
///
/// `ptr` must be null or point to at least `N` readable bytes.
pub(crate) unsafe fn read_array<const N: usize>(
    ptr: *const u8,
    what: &'static str,
) -> Result<[u8; N]> {
    let view = BufferRef::from_raw_parts(ptr, N, what)?;
    view.to_array()
        .ok_or_else(|| BindingError::InvalidArgument(format!("{} must be {} bytes", what, N)).into())
}

/// Write `value` through an out-pointer.
///
/// # Safety
///
/// `ptr` must be null or valid for a write of `T`.
pub(crate) unsafe fn write_out<T>(ptr: *mut T, value: T, what: &'static str) -> Result<()> {
    if ptr.is_null() {
        return Err(BindingError::NullPointer(what).into());
    }
    ptr.write(value);
    Ok(())
}

/// Convert a C count to `usize`, rejecting negatives.
pub(crate) fn non_negative(value: i64, what: &'static str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| BindingError::InvalidArgument(format!("{} must not be negative", what)).into())
}
