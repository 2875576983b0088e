//! Error type for the exported functions.

use renterbind_core::{BindingError, CollaboratorError, ContractError};
use renterbind_currency::CurrencyError;
use renterbind_txn::TxnError;
use thiserror::Error;

/// Anything an exported function can fail with. Rendered into the caller's
/// error slot; never returned across the boundary directly.
#[derive(Debug, Error)]
pub enum FfiError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Transaction(#[from] TxnError),
}

impl From<CollaboratorError> for FfiError {
    fn from(e: CollaboratorError) -> Self {
        FfiError::Binding(e.into())
    }
}

impl From<CurrencyError> for FfiError {
    fn from(e: CurrencyError) -> Self {
        FfiError::Binding(e.into())
    }
}

impl From<ContractError> for FfiError {
    fn from(e: ContractError) -> Self {
        FfiError::Binding(e.into())
    }
}

pub type Result<T> = std::result::Result<T, FfiError>;
