//! Error types for transaction assembly.

use renterbind_currency::{Currency, CurrencyError};
use thiserror::Error;

use crate::types::OutputId;

/// Errors raised while building, signing or decoding a transaction.
#[derive(Debug, Error)]
pub enum TxnError {
    /// A public key was malformed or used an unsupported algorithm.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// An address was malformed or failed its checksum.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// An output id was not 32 hex-encoded bytes.
    #[error("invalid output id: {0}")]
    InvalidId(String),

    /// A wallet seed was not 32 hex-encoded bytes.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// Inputs do not cover outputs.
    #[error("insufficient inputs: have {inputs}, need {outputs}")]
    InsufficientInputs { inputs: Currency, outputs: Currency },

    /// A mutating call was made after `finalize`.
    #[error("transaction already finalized")]
    AlreadyFinalized,

    /// The same output was added as an input twice.
    #[error("duplicate input {0}")]
    DuplicateInput(OutputId),

    /// The derived key does not unlock the input it was scheduled for.
    #[error("key {index} does not match the public key of input {parent_id}")]
    KeyMismatch { parent_id: OutputId, index: u64 },

    /// A signature did not verify.
    #[error("invalid signature for input {0}")]
    InvalidSignature(OutputId),

    #[error("currency error: {0}")]
    Currency(#[from] CurrencyError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for transaction operations.
pub type Result<T> = std::result::Result<T, TxnError>;
