//! C ABI for renterbind.
//!
//! Every stateful object is an opaque `us_handle_t` (a `uintptr_t`, zero
//! meaning "none"). Every fallible function takes a context key `ctx` first:
//! `0` selects the process-wide error slot, any other value a private slot
//! (usually the caller's client handle). On failure a function returns its
//! sentinel (null handle, `false`, `-1` or a null pointer) and leaves
//! `"<function>: <cause>"` in that slot, readable with [`us_error`].
//!
//! # Buffers
//!
//! Functions that take a pointer and a length read or write the caller's
//! memory in place. The length is trusted: the caller guarantees the buffer
//! holds at least that many bytes and stays valid for the duration of the
//! call. Only null pointers are detected.
//!
//! # Ownership
//!
//! Strings returned by this library are freed with [`us_string_free`],
//! byte arrays with [`us_bytes_free`]. Handles are released exactly once
//! by their close/free function; releasing a null or already-released
//! handle does nothing.

use std::ffi::{c_char, CString};

use renterbind_core::{BindingError, BufferView, ContextKey, KEY_SIZE};

mod contract;
mod currency;
mod error;
mod files;
mod guard;
mod lowlevel;
mod state;
mod txn;

pub use contract::*;
pub use currency::*;
pub use error::{FfiError, Result};
pub use files::*;
pub use lowlevel::*;
pub use state::install_backend;
pub use txn::*;

use guard::{guarded, write_out};
use state::{CONFIG, ERRORS};

/// Last error recorded for `ctx`, or null if there is none. Reading does not
/// clear the slot. Free the result with [`us_string_free`].
#[no_mangle]
pub extern "C" fn us_error(ctx: usize) -> *mut c_char {
    match ERRORS.fetch(ContextKey::from_raw(ctx)) {
        Some(message) => {
            let message = message.replace('\0', "\\0");
            CString::new(message)
                .map(CString::into_raw)
                .unwrap_or(std::ptr::null_mut())
        }
        None => std::ptr::null_mut(),
    }
}

/// Forget the error recorded for `ctx`.
#[no_mangle]
pub extern "C" fn us_error_clear(ctx: usize) {
    ERRORS.clear(ContextKey::from_raw(ctx));
}

/// Free a string returned by this library.
///
/// # Safety
///
/// `s` must be null or a pointer previously returned by this library and not
/// yet freed.
#[no_mangle]
pub unsafe extern "C" fn us_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Free a byte array returned by this library.
///
/// # Safety
///
/// `ptr`/`len` must be exactly a pair previously returned by this library
/// and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn us_bytes_free(ptr: *mut u8, len: usize) {
    if !ptr.is_null() {
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)));
    }
}

/// Hand `bytes` to the caller; freed with [`us_bytes_free`].
pub(crate) fn into_c_bytes(bytes: Vec<u8>, out_len: *mut usize) -> Result<*mut u8> {
    let boxed = bytes.into_boxed_slice();
    // SAFETY: `out_len` is checked for null; validity is the caller's contract.
    unsafe { write_out(out_len, boxed.len(), "out_len")? };
    Ok(Box::into_raw(boxed) as *mut u8)
}

/// Switch to an in-process storage network with `host_count` hosts.
/// Handles created earlier keep using the previous backend.
#[no_mangle]
pub extern "C" fn us_backend_use_memory(host_count: usize) {
    state::install_memory(host_count);
}

/// Copy the key of in-memory host `index` into `out[32]`. Fails when the
/// installed backend is not the in-memory one.
///
/// # Safety
///
/// `out` must be null or point to 32 writable bytes.
#[no_mangle]
pub unsafe extern "C" fn us_memory_host_key(ctx: usize, index: usize, out: *mut u8) -> bool {
    guarded(ctx, "us_memory_host_key", false, || {
        let memory = state::memory().ok_or_else(|| {
            BindingError::InvalidArgument(
                "in-memory backend is not installed".into(),
            )
        })?;
        let key = memory.host_keys().get(index).copied().ok_or_else(|| {
            BindingError::InvalidArgument(format!("no host {}", index))
        })?;
        let mut dst = BufferView::from_raw_parts(out, KEY_SIZE, "out")?;
        dst.copy_from_slice(&key);
        Ok(true)
    })
}

/// Size in bytes of one sector; `us_ll_upload` requires exactly this much.
#[no_mangle]
pub extern "C" fn us_sector_size() -> usize {
    CONFIG.sector_size
}
