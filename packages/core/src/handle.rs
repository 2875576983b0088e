//! Opaque handle registry.
//!
//! Foreign code never sees a Rust reference. Instead each live object is
//! stored in a table and the caller receives a machine-word integer key.
//! Keys come from a monotonically increasing counter, so they are never
//! derived from an address and are never reused, even after release.
//!
//! All three operations take the same lock. `load` clones the stored value
//! (objects are kept behind `Arc`) so the lock is never held across a call
//! into the storage layer.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{BindingError, Result};

/// An opaque, pointer-sized token. Zero is the null handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Handle(usize);

impl Handle {
    /// The null handle. Never refers to an object.
    pub const NULL: Handle = Handle(0);

    pub const fn from_raw(raw: usize) -> Self {
        Handle(raw)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Table<T> {
    /// Last issued key; the next store uses `last + 1`.
    last: usize,
    entries: HashMap<usize, T>,
}

/// Thread-safe table from [`Handle`] to live objects.
///
/// # Example
///
/// ```
/// use renterbind_core::{Handle, HandleRegistry};
///
/// let registry = HandleRegistry::new(16);
/// let h = registry.store("session").unwrap();
/// assert_eq!(registry.load(h).unwrap(), "session");
///
/// assert_eq!(registry.release(h), Some("session"));
/// assert!(registry.load(h).is_err());
///
/// // Releasing twice, or releasing null, is a no-op.
/// assert_eq!(registry.release(h), None);
/// assert_eq!(registry.release(Handle::NULL), None);
/// ```
pub struct HandleRegistry<T> {
    table: Mutex<Table<T>>,
    max_handles: usize,
}

impl<T> HandleRegistry<T> {
    /// Create a registry that holds at most `max_handles` live entries.
    pub fn new(max_handles: usize) -> Self {
        Self {
            table: Mutex::new(Table {
                last: 0,
                entries: HashMap::new(),
            }),
            max_handles,
        }
    }

    /// Record `value` and return a fresh handle for it.
    pub fn store(&self, value: T) -> Result<Handle> {
        let mut table = self.table.lock();
        if table.entries.len() >= self.max_handles {
            return Err(BindingError::ResourceExhausted {
                limit: self.max_handles,
            });
        }
        // A wrapped counter would start reissuing old keys.
        let next = table
            .last
            .checked_add(1)
            .ok_or(BindingError::ResourceExhausted {
                limit: self.max_handles,
            })?;
        table.last = next;
        table.entries.insert(next, value);
        trace!(handle = next, live = table.entries.len(), "stored handle");
        Ok(Handle(next))
    }

    /// Like [`store`](Self::store), but `None` yields [`Handle::NULL`]
    /// without allocating a key.
    pub fn store_opt(&self, value: Option<T>) -> Result<Handle> {
        match value {
            Some(v) => self.store(v),
            None => Ok(Handle::NULL),
        }
    }

    /// Run `f` against the object behind `handle` while holding the lock.
    ///
    /// Keep `f` short; prefer [`load`](Self::load) for anything that blocks.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&T) -> R) -> Result<R> {
        let table = self.table.lock();
        table
            .entries
            .get(&handle.0)
            .map(f)
            .ok_or(BindingError::InvalidHandle(handle))
    }

    /// Remove the entry for `handle`, returning the object if it was live.
    ///
    /// Null and unknown handles are ignored.
    pub fn release(&self, handle: Handle) -> Option<T> {
        if handle.is_null() {
            return None;
        }
        let removed = self.table.lock().entries.remove(&handle.0);
        if removed.is_some() {
            debug!(handle = handle.0, "released handle");
        }
        removed
    }

    /// Remove the entry for `handle` only if `pred` accepts it. Check and
    /// removal happen under one lock acquisition.
    pub fn release_if(&self, handle: Handle, pred: impl FnOnce(&T) -> bool) -> Option<T> {
        let mut table = self.table.lock();
        if !table.entries.get(&handle.0).map_or(false, pred) {
            return None;
        }
        let removed = table.entries.remove(&handle.0);
        debug!(handle = handle.0, "released handle");
        removed
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.table.lock().entries.contains_key(&handle.0)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> HandleRegistry<T> {
    /// Return a clone of the object behind `handle`.
    ///
    /// # Errors
    ///
    /// [`BindingError::InvalidHandle`] if the handle is null, unknown, or
    /// already released. A `load` that races a `release` sees one of the two
    /// consistent outcomes, never a torn entry.
    pub fn load(&self, handle: Handle) -> Result<T> {
        self.with(handle, T::clone)
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new(crate::BindingConfig::default().max_handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_start_at_one_and_increase() {
        let registry = HandleRegistry::new(8);
        let a = registry.store('a').unwrap();
        let b = registry.store('b').unwrap();
        assert_eq!(a.as_raw(), 1);
        assert_eq!(b.as_raw(), 2);
        assert!(!a.is_null());
    }

    #[test]
    fn store_none_returns_null_without_allocating() {
        let registry: HandleRegistry<u8> = HandleRegistry::new(8);
        assert_eq!(registry.store_opt(None).unwrap(), Handle::NULL);
        let h = registry.store_opt(Some(1)).unwrap();
        assert_eq!(h.as_raw(), 1);
    }

    #[test]
    fn handles_are_not_reused_after_release() {
        let registry = HandleRegistry::new(8);
        let a = registry.store(1).unwrap();
        registry.release(a);
        let b = registry.store(2).unwrap();
        assert_ne!(a, b);
        assert!(matches!(
            registry.load(a),
            Err(BindingError::InvalidHandle(h)) if h == a
        ));
        assert_eq!(registry.load(b).unwrap(), 2);
    }

    #[test]
    fn load_null_is_invalid() {
        let registry: HandleRegistry<u8> = HandleRegistry::new(8);
        assert!(matches!(
            registry.load(Handle::NULL),
            Err(BindingError::InvalidHandle(_))
        ));
    }

    #[test]
    fn release_unknown_is_noop() {
        let registry: HandleRegistry<u8> = HandleRegistry::new(8);
        assert_eq!(registry.release(Handle::from_raw(99)), None);
        assert_eq!(registry.release(Handle::NULL), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn limit_is_enforced_and_freed_slots_count_again() {
        let registry = HandleRegistry::new(2);
        let a = registry.store(()).unwrap();
        registry.store(()).unwrap();
        assert!(matches!(
            registry.store(()),
            Err(BindingError::ResourceExhausted { limit: 2 })
        ));
        registry.release(a);
        let c = registry.store(()).unwrap();
        assert_eq!(c.as_raw(), 3);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn release_if_keeps_rejected_entries() {
        let registry = HandleRegistry::new(4);
        let h = registry.store("file").unwrap();
        assert_eq!(registry.release_if(h, |v| *v == "session"), None);
        assert!(registry.contains(h));
        assert_eq!(registry.release_if(h, |v| *v == "file"), Some("file"));
        assert_eq!(registry.release_if(h, |_| true), None);
    }

    #[test]
    fn with_borrows_in_place() {
        let registry = HandleRegistry::new(4);
        let h = registry.store(vec![1, 2, 3]).unwrap();
        assert_eq!(registry.with(h, |v| v.len()).unwrap(), 3);
        assert!(registry.contains(h));
    }
}
