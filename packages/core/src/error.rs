//! Error types for the binding layer.

use thiserror::Error;

use crate::backend::CollaboratorError;
use crate::contract::ContractError;
use crate::handle::Handle;
use renterbind_currency::CurrencyError;

/// Everything that can go wrong between a foreign call and its result.
///
/// None of these abort the process. The binding surface turns each one into a
/// sentinel return value plus a message in the caller's [`crate::ErrorContext`].
#[derive(Debug, Error)]
pub enum BindingError {
    /// The handle is null, was never issued, or has already been released.
    #[error("invalid handle: {0}")]
    InvalidHandle(Handle),

    /// The handle is live but refers to a different kind of object.
    #[error("handle {handle} is a {actual}, expected a {expected}")]
    WrongHandleKind {
        handle: Handle,
        expected: &'static str,
        actual: &'static str,
    },

    /// The registry refused to issue another handle.
    #[error("handle limit reached ({limit} live handles)")]
    ResourceExhausted { limit: usize },

    /// A required pointer argument was null.
    #[error("null pointer for {0}")]
    NullPointer(&'static str),

    /// A C string argument was not valid UTF-8.
    #[error("{0} is not valid UTF-8")]
    InvalidString(&'static str),

    /// A numeric argument was out of range (negative count, bad whence, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Contract record could not be decoded.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Currency text could not be parsed.
    #[error(transparent)]
    Currency(#[from] CurrencyError),

    /// Failure reported by the storage, session, or network layer.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// A panic was caught before it could unwind across the boundary.
    #[error("internal panic: {0}")]
    Panicked(String),
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, BindingError>;
