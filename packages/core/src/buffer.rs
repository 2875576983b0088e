//! Zero-copy views over foreign-owned memory.
//!
//! A foreign caller hands us an address and a length. These views alias that
//! memory directly: no allocation, no copy. Reads and writes land in the
//! caller's buffer.
//!
//! # Trust boundary
//!
//! Nothing here can check that the declared length matches the real capacity
//! of the foreign buffer, or that the buffer outlives the view. Both are the
//! caller's obligation, stated on every `unsafe` constructor and repeated on
//! each exported function that takes a buffer. The only checks performed are
//! the null test and the declared length itself.

use std::ops::{Deref, DerefMut};

use crate::error::{BindingError, Result};

/// Mutable, borrowed view of `len` foreign bytes.
#[derive(Debug)]
pub struct BufferView<'a> {
    bytes: &'a mut [u8],
}

impl<'a> BufferView<'a> {
    /// Alias `len` bytes at `ptr`.
    ///
    /// A zero length yields an empty view regardless of `ptr`.
    ///
    /// # Errors
    ///
    /// [`BindingError::NullPointer`] if `ptr` is null and `len > 0`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `len` writable bytes that stay valid and
    /// are not accessed through any other path for the lifetime `'a`.
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize, what: &'static str) -> Result<Self> {
        if len == 0 {
            return Ok(Self { bytes: &mut [] });
        }
        if ptr.is_null() {
            return Err(BindingError::NullPointer(what));
        }
        Ok(Self {
            bytes: std::slice::from_raw_parts_mut(ptr, len),
        })
    }

    /// Wrap an existing Rust slice.
    pub fn from_slice(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }
}

impl Deref for BufferView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl DerefMut for BufferView<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

/// Read-only, borrowed view of `len` foreign bytes.
#[derive(Debug, Clone, Copy)]
pub struct BufferRef<'a> {
    bytes: &'a [u8],
}

impl<'a> BufferRef<'a> {
    /// Alias `len` bytes at `ptr` for reading.
    ///
    /// # Errors
    ///
    /// [`BindingError::NullPointer`] if `ptr` is null and `len > 0`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `len` readable bytes that stay valid and
    /// unmodified for the lifetime `'a`.
    pub unsafe fn from_raw_parts(ptr: *const u8, len: usize, what: &'static str) -> Result<Self> {
        if len == 0 {
            return Ok(Self { bytes: &[] });
        }
        if ptr.is_null() {
            return Err(BindingError::NullPointer(what));
        }
        Ok(Self {
            bytes: std::slice::from_raw_parts(ptr, len),
        })
    }

    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Copy out a fixed-size array; fails if the view has a different length.
    pub fn to_array<const N: usize>(&self) -> Option<[u8; N]> {
        self.bytes.try_into().ok()
    }
}

impl Deref for BufferRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}
