//! Fixed-layout contract record.
//!
//! A contract is identified by three 32-byte values, laid out with no padding:
//!
//! ```text
//! offset  0: host public key   (32)
//! offset 32: contract id       (32)
//! offset 64: renter key seed   (32)
//! ```
//!
//! This layout is part of the C ABI (`contract_t`) and must not change. The
//! codec performs no key validation; the storage layer checks keys when a
//! contract is activated.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of each key or id field.
pub const KEY_SIZE: usize = 32;

/// Size of an encoded contract record.
pub const CONTRACT_SIZE: usize = 3 * KEY_SIZE;

/// Errors decoding a contract record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("invalid contract length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid contract hex: {0}")]
    Hex(String),
}

/// The identifying material of one storage contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contract {
    pub host_key: [u8; KEY_SIZE],
    pub id: [u8; KEY_SIZE],
    pub renter_seed: [u8; KEY_SIZE],
}

/// C view of a [`Contract`]; identical to the encoded byte layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawContract {
    pub host_key: [u8; KEY_SIZE],
    pub id: [u8; KEY_SIZE],
    pub renter_key: [u8; KEY_SIZE],
}

const _: () = assert!(std::mem::size_of::<RawContract>() == CONTRACT_SIZE);

/// Encode the three fields into a 96-byte record.
pub fn encode(
    host_key: &[u8; KEY_SIZE],
    id: &[u8; KEY_SIZE],
    renter_seed: &[u8; KEY_SIZE],
) -> [u8; CONTRACT_SIZE] {
    let mut out = [0u8; CONTRACT_SIZE];
    out[..KEY_SIZE].copy_from_slice(host_key);
    out[KEY_SIZE..2 * KEY_SIZE].copy_from_slice(id);
    out[2 * KEY_SIZE..].copy_from_slice(renter_seed);
    out
}

/// Split a 96-byte record into `(host_key, id, renter_seed)`.
pub fn decode(
    bytes: &[u8],
) -> Result<([u8; KEY_SIZE], [u8; KEY_SIZE], [u8; KEY_SIZE]), ContractError> {
    if bytes.len() != CONTRACT_SIZE {
        return Err(ContractError::Length {
            expected: CONTRACT_SIZE,
            actual: bytes.len(),
        });
    }
    let field = |i: usize| {
        let mut out = [0u8; KEY_SIZE];
        out.copy_from_slice(&bytes[i * KEY_SIZE..(i + 1) * KEY_SIZE]);
        out
    };
    Ok((field(0), field(1), field(2)))
}

impl Contract {
    pub fn new(host_key: [u8; KEY_SIZE], id: [u8; KEY_SIZE], renter_seed: [u8; KEY_SIZE]) -> Self {
        Self {
            host_key,
            id,
            renter_seed,
        }
    }

    pub fn to_bytes(&self) -> [u8; CONTRACT_SIZE] {
        encode(&self.host_key, &self.id, &self.renter_seed)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContractError> {
        let (host_key, id, renter_seed) = decode(bytes)?;
        Ok(Self::new(host_key, id, renter_seed))
    }

    /// 192 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(text: &str) -> Result<Self, ContractError> {
        let bytes = hex::decode(text.trim()).map_err(|e| ContractError::Hex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

// The renter seed is a private key; keep it out of logs.
impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("host_key", &hex::encode(self.host_key))
            .field("id", &hex::encode(self.id))
            .field("renter_seed", &"<redacted>")
            .finish()
    }
}

impl From<RawContract> for Contract {
    fn from(raw: RawContract) -> Self {
        Contract::new(raw.host_key, raw.id, raw.renter_key)
    }
}

impl From<Contract> for RawContract {
    fn from(c: Contract) -> Self {
        RawContract {
            host_key: c.host_key,
            id: c.id,
            renter_key: c.renter_seed,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            h in any::<[u8; 32]>(),
            i in any::<[u8; 32]>(),
            r in any::<[u8; 32]>(),
        ) {
            let (h2, i2, r2) = decode(&encode(&h, &i, &r)).unwrap();
            prop_assert_eq!((h2, i2, r2), (h, i, r));
        }

        #[test]
        fn prop_other_lengths_fail(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
            prop_assume!(bytes.len() != CONTRACT_SIZE);
            let is_length_error = matches!(decode(&bytes), Err(ContractError::Length { .. }));
            prop_assert!(is_length_error);
        }
    }
}
