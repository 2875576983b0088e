//! Transaction data types and their text and binary forms.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use renterbind_currency::Currency;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::blake2b256;
use crate::encoding::{write_prefixed, SiaEncode};
use crate::error::{Result, TxnError};

macro_rules! serde_via_string {
    ($t:ty) => {
        impl Serialize for $t {
            fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                s.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
                let text = String::deserialize(d)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// A 16-byte, zero-padded name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Specifier([u8; 16]);

/// The only signature algorithm accepted for inputs.
pub const ED25519: Specifier = Specifier::new(b"ed25519");

impl Specifier {
    /// Build a specifier from at most 16 bytes; longer names are truncated.
    pub const fn new(name: &[u8]) -> Self {
        let mut out = [0u8; 16];
        let mut i = 0;
        while i < name.len() && i < 16 {
            out[i] = name[i];
            i += 1;
        }
        Specifier(out)
    }

    /// `None` if `name` does not fit.
    pub fn from_name(name: &str) -> Option<Self> {
        (name.len() <= 16).then(|| Specifier::new(name.as_bytes()))
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(16);
        write!(f, "{}", String::from_utf8_lossy(&self.0[..end]))
    }
}

impl fmt::Debug for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Specifier({})", self)
    }
}

impl SiaEncode for Specifier {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

/// Id of the output being spent by an input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId([u8; 32]);

impl OutputId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        OutputId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputId({})", self)
    }
}

impl FromStr for OutputId {
    type Err = TxnError;

    fn from_str(s: &str) -> Result<Self> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut out).map_err(|e| TxnError::InvalidId(e.to_string()))?;
        Ok(OutputId(out))
    }
}

serde_via_string!(OutputId);

impl SiaEncode for OutputId {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.0.encode_to(buf);
    }
}

const CHECKSUM_SIZE: usize = 6;

/// A 32-byte address. Its text form appends a 6-byte checksum, giving 76
/// hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnlockHash([u8; 32]);

impl UnlockHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        UnlockHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn checksum(&self) -> [u8; CHECKSUM_SIZE] {
        let digest = blake2b256(&[&self.0]);
        let mut out = [0u8; CHECKSUM_SIZE];
        out.copy_from_slice(&digest[..CHECKSUM_SIZE]);
        out
    }
}

impl fmt::Display for UnlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", hex::encode(self.0), hex::encode(self.checksum()))
    }
}

impl fmt::Debug for UnlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnlockHash({})", self)
    }
}

impl FromStr for UnlockHash {
    type Err = TxnError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut raw = [0u8; 32 + CHECKSUM_SIZE];
        hex::decode_to_slice(s, &mut raw)
            .map_err(|_| TxnError::InvalidAddress(format!("expected 76 hex characters: {:?}", s)))?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&raw[..32]);
        let address = UnlockHash(hash);
        if address.checksum()[..] != raw[32..] {
            return Err(TxnError::InvalidAddress(format!("bad checksum: {}", s)));
        }
        Ok(address)
    }
}

serde_via_string!(UnlockHash);

impl SiaEncode for UnlockHash {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.0.encode_to(buf);
    }
}

/// A public key tagged with its algorithm, written `algorithm:hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    pub algorithm: Specifier,
    pub key: Vec<u8>,
}

impl PublicKey {
    pub fn ed25519(key: [u8; 32]) -> Self {
        Self {
            algorithm: ED25519,
            key: key.to_vec(),
        }
    }

    /// True for a 32-byte Ed25519 key.
    pub fn is_ed25519(&self) -> bool {
        self.algorithm == ED25519 && self.key.len() == 32
    }

    fn verifying_key(&self) -> Option<VerifyingKey> {
        if !self.is_ed25519() {
            return None;
        }
        let bytes: [u8; 32] = self.key.as_slice().try_into().ok()?;
        VerifyingKey::from_bytes(&bytes).ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, hex::encode(&self.key))
    }
}

impl FromStr for PublicKey {
    type Err = TxnError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (algorithm, key) = s
            .split_once(':')
            .ok_or_else(|| TxnError::InvalidPublicKey(format!("missing algorithm: {:?}", s)))?;
        let algorithm = Specifier::from_name(algorithm)
            .ok_or_else(|| TxnError::InvalidPublicKey(format!("algorithm too long: {:?}", algorithm)))?;
        let key = hex::decode(key).map_err(|e| TxnError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { algorithm, key })
    }
}

serde_via_string!(PublicKey);

impl SiaEncode for PublicKey {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.algorithm.encode_to(buf);
        write_prefixed(buf, &self.key);
    }
}

/// The conditions under which an output may be spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockConditions {
    pub timelock: u64,
    pub public_keys: Vec<PublicKey>,
    pub signatures_required: u64,
}

impl UnlockConditions {
    /// One key, one signature, no timelock.
    pub fn standard(key: PublicKey) -> Self {
        Self {
            timelock: 0,
            public_keys: vec![key],
            signatures_required: 1,
        }
    }

    /// The address these conditions unlock.
    pub fn unlock_hash(&self) -> UnlockHash {
        UnlockHash(blake2b256(&[&self.encode()]))
    }
}

impl SiaEncode for UnlockConditions {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.timelock.encode_to(buf);
        self.public_keys.encode_to(buf);
        self.signatures_required.encode_to(buf);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiacoinInput {
    #[serde(rename = "parentID")]
    pub parent_id: OutputId,
    pub unlock_conditions: UnlockConditions,
}

impl SiaEncode for SiacoinInput {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.parent_id.encode_to(buf);
        self.unlock_conditions.encode_to(buf);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiacoinOutput {
    pub value: Currency,
    pub unlock_hash: UnlockHash,
}

impl SiaEncode for SiacoinOutput {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.value.encode_to(buf);
        self.unlock_hash.encode_to(buf);
    }
}

/// Which parts of the transaction a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoveredFields {
    pub whole_transaction: bool,
}

impl SiaEncode for CoveredFields {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.whole_transaction.encode_to(buf);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignature {
    #[serde(rename = "parentID")]
    pub parent_id: OutputId,
    pub public_key_index: u64,
    pub timelock: u64,
    pub covered_fields: CoveredFields,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl TransactionSignature {
    /// An unsigned whole-transaction signature for `parent_id`.
    pub fn whole(parent_id: OutputId) -> Self {
        Self {
            parent_id,
            public_key_index: 0,
            timelock: 0,
            covered_fields: CoveredFields {
                whole_transaction: true,
            },
            signature: Vec::new(),
        }
    }
}

impl SiaEncode for TransactionSignature {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.parent_id.encode_to(buf);
        self.public_key_index.encode_to(buf);
        self.timelock.encode_to(buf);
        self.covered_fields.encode_to(buf);
        write_prefixed(buf, &self.signature);
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// A payment transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub siacoin_inputs: Vec<SiacoinInput>,
    pub siacoin_outputs: Vec<SiacoinOutput>,
    pub miner_fees: Vec<Currency>,
    pub transaction_signatures: Vec<TransactionSignature>,
}

impl Transaction {
    fn encode_unsigned(&self, buf: &mut Vec<u8>) {
        self.siacoin_inputs.encode_to(buf);
        self.siacoin_outputs.encode_to(buf);
        self.miner_fees.encode_to(buf);
    }

    /// Hash of the signature-less encoding.
    pub fn id(&self) -> [u8; 32] {
        let mut buf = Vec::new();
        self.encode_unsigned(&mut buf);
        blake2b256(&[&buf])
    }

    /// The message a whole-transaction signature signs.
    pub fn sig_hash(&self, sig: &TransactionSignature) -> [u8; 32] {
        let mut buf = Vec::new();
        self.encode_unsigned(&mut buf);
        sig.parent_id.encode_to(&mut buf);
        sig.public_key_index.encode_to(&mut buf);
        sig.timelock.encode_to(&mut buf);
        blake2b256(&[&buf])
    }

    pub fn output_total(&self) -> Currency {
        self.siacoin_outputs.iter().map(|o| &o.value).sum()
    }

    pub fn fee_total(&self) -> Currency {
        self.miner_fees.iter().sum()
    }

    /// Check that every input carries a valid signature from its key.
    pub fn verify_signatures(&self) -> Result<()> {
        for input in &self.siacoin_inputs {
            let id = input.parent_id;
            let sig = self
                .transaction_signatures
                .iter()
                .find(|s| s.parent_id == id)
                .ok_or(TxnError::InvalidSignature(id))?;
            let key = input
                .unlock_conditions
                .public_keys
                .get(sig.public_key_index as usize)
                .and_then(PublicKey::verifying_key)
                .ok_or(TxnError::InvalidSignature(id))?;
            let signature =
                Signature::from_slice(&sig.signature).map_err(|_| TxnError::InvalidSignature(id))?;
            key.verify(&self.sig_hash(sig), &signature)
                .map_err(|_| TxnError::InvalidSignature(id))?;
        }
        Ok(())
    }

    /// Field-named JSON interchange form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl SiaEncode for Transaction {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.encode_unsigned(buf);
        self.transaction_signatures.encode_to(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specifier_display_trims_padding() {
        assert_eq!(ED25519.to_string(), "ed25519");
        assert!(Specifier::from_name("a-name-longer-than-16").is_none());
    }

    #[test]
    fn address_text_has_checksum() {
        let addr = UnlockHash::from_bytes([5u8; 32]);
        let text = addr.to_string();
        assert_eq!(text.len(), 76);
        assert_eq!(text.parse::<UnlockHash>().unwrap(), addr);

        let mut tampered = text.clone();
        tampered.replace_range(75.., if text.ends_with('0') { "1" } else { "0" });
        assert!(matches!(
            tampered.parse::<UnlockHash>(),
            Err(TxnError::InvalidAddress(_))
        ));
        assert!(text[..64].parse::<UnlockHash>().is_err());
    }

    #[test]
    fn public_key_text_form() {
        let key = PublicKey::ed25519([1u8; 32]);
        let text = key.to_string();
        assert!(text.starts_with("ed25519:"));
        assert_eq!(text.parse::<PublicKey>().unwrap(), key);

        let other: PublicKey = "secp256k1:abcd".parse().unwrap();
        assert!(!other.is_ed25519());
        let short: PublicKey = "ed25519:abcd".parse().unwrap();
        assert!(!short.is_ed25519());
        assert!("abcd".parse::<PublicKey>().is_err());
        assert!("ed25519:zz".parse::<PublicKey>().is_err());
    }

    #[test]
    fn standard_conditions_hash_is_stable() {
        let a = UnlockConditions::standard(PublicKey::ed25519([1u8; 32]));
        let b = UnlockConditions::standard(PublicKey::ed25519([2u8; 32]));
        assert_eq!(a.unlock_hash(), a.clone().unlock_hash());
        assert_ne!(a.unlock_hash(), b.unlock_hash());
    }

    #[test]
    fn json_uses_field_names() {
        let txn = Transaction {
            siacoin_inputs: vec![SiacoinInput {
                parent_id: OutputId::from_bytes([3u8; 32]),
                unlock_conditions: UnlockConditions::standard(PublicKey::ed25519([4u8; 32])),
            }],
            siacoin_outputs: vec![SiacoinOutput {
                value: Currency::from(10u64),
                unlock_hash: UnlockHash::from_bytes([6u8; 32]),
            }],
            miner_fees: vec![Currency::from(1u64)],
            transaction_signatures: vec![TransactionSignature {
                signature: vec![9u8; 64],
                ..TransactionSignature::whole(OutputId::from_bytes([3u8; 32]))
            }],
        };
        let json = txn.to_json().unwrap();
        assert!(json.contains("\"parentID\""));
        assert!(json.contains("\"siacoinOutputs\""));
        assert!(json.contains("\"value\": \"10\""));
        assert_eq!(Transaction::from_json(&json).unwrap(), txn);
    }

    #[test]
    fn signature_hash_depends_on_contents() {
        let mut txn = Transaction::default();
        let sig = TransactionSignature::whole(OutputId::from_bytes([0u8; 32]));
        let before = txn.sig_hash(&sig);
        txn.miner_fees.push(Currency::from(1u64));
        assert_ne!(before, txn.sig_hash(&sig));
        assert_ne!(txn.id(), Transaction::default().id());
    }
}
