//! Last-error slots for foreign callers.
//!
//! Every fallible binding returns a sentinel (null handle, `-1`, `false`) and
//! leaves a message in a slot keyed by the caller's context. A context is
//! either the process-wide slot ([`ContextKey::GLOBAL`]) or any other key the
//! caller chooses, usually the handle of its top-level client, so concurrent
//! clients never overwrite each other's errors.
//!
//! Reads do not consume the slot. Successful calls leave it untouched, so a
//! caller must check the sentinel before asking for the message.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use crate::handle::Handle;

/// Key selecting an error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextKey(usize);

impl ContextKey {
    /// The single process-wide slot.
    pub const GLOBAL: ContextKey = ContextKey(0);

    pub const fn from_raw(raw: usize) -> Self {
        ContextKey(raw)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }
}

impl From<Handle> for ContextKey {
    fn from(h: Handle) -> Self {
        ContextKey(h.as_raw())
    }
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Name of the binding that failed, e.g. `us_file_read`.
    pub operation: &'static str,
    /// Underlying cause, rendered once at record time.
    pub cause: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.cause)
    }
}

/// Mapping from context key to the most recent failure in that context.
#[derive(Default)]
pub struct ErrorContext {
    slots: Mutex<HashMap<ContextKey, ErrorRecord>>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot for `key` with `operation: cause`.
    pub fn record(&self, key: ContextKey, operation: &'static str, cause: &dyn fmt::Display) {
        let record = ErrorRecord {
            operation,
            cause: cause.to_string(),
        };
        debug!(ctx = key.as_raw(), error = %record, "binding call failed");
        self.slots.lock().insert(key, record);
    }

    /// The formatted message for `key`, if any. Does not clear the slot.
    pub fn fetch(&self, key: ContextKey) -> Option<String> {
        self.slots.lock().get(&key).map(ToString::to_string)
    }

    /// The structured record for `key`, if any.
    pub fn fetch_record(&self, key: ContextKey) -> Option<ErrorRecord> {
        self.slots.lock().get(&key).cloned()
    }

    /// Empty the slot for `key`.
    pub fn clear(&self, key: ContextKey) {
        self.slots.lock().remove(&key);
    }
}
