//! renterbind-txn: payment transaction assembly.
//!
//! [`TransactionBuilder`] collects outputs and inputs, estimates the miner
//! fee from the encoded size of the draft, finalizes with a change output and
//! signs every input with keys derived from a [`KeySource`].
//!
//! ```
//! use renterbind_currency::Currency;
//! use renterbind_txn::{BuilderConfig, KeySource, OutputId, Seed, TransactionBuilder};
//!
//! let seed = Seed::from_bytes([7u8; 32]);
//! let payee = seed.address(1);
//! let change = seed.address(2);
//!
//! let mut builder = TransactionBuilder::new(BuilderConfig::new(Currency::from(1u64)));
//! builder.add_output(payee, Currency::from(1000u64)).unwrap();
//! let covered = builder
//!     .add_input(OutputId::from_bytes([1u8; 32]), Currency::from(2000u64), seed.public_key(0), 0)
//!     .unwrap();
//! assert!(covered);
//!
//! builder.finalize(change).unwrap();
//! builder.sign(&seed).unwrap();
//! assert!(builder.transaction().verify_signatures().is_ok());
//! ```

mod builder;
pub mod encoding;
mod error;
mod keys;
mod types;

pub use builder::{BuilderConfig, TransactionBuilder};
pub use encoding::SiaEncode;
pub use error::{Result, TxnError};
pub use keys::{KeySource, Seed};
pub use types::{
    CoveredFields, OutputId, PublicKey, SiacoinInput, SiacoinOutput, Specifier, Transaction,
    TransactionSignature, UnlockConditions, UnlockHash, ED25519,
};

/// BLAKE2b with a 32-byte digest. `renterbind-core` carries the same helper
/// for host keys and sector roots; this copy keeps the crate free of a
/// dependency on the binding layer.
pub(crate) fn blake2b256(chunks: &[&[u8]]) -> [u8; 32] {
    use blake2::{Blake2b, Digest};

    let mut hasher = Blake2b::<blake2::digest::consts::U32>::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
