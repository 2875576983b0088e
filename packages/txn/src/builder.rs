//! Incremental transaction builder.
//!
//! A builder starts **open**: outputs and inputs may be added, and every
//! input reports whether the inputs so far cover the outputs plus the fee
//! estimate. `finalize` commits the miner fee and change output and moves the
//! builder to **finalized**, after which it refuses further mutation.
//! Signing is allowed in either state.
//!
//! # Fee policy
//!
//! The fee is `fee_per_byte * (encoded size + signature_overhead * inputs)`.
//! At finalization the fee is recomputed against the final layout (miner fee
//! and change included) until it settles on a fee that exactly pays for
//! the layout it produces. When the leftover (`inputs - outputs`) cannot
//! pay the computed fee, the whole leftover becomes the fee and no change
//! output is created. The fee never exceeds the leftover, so neither fee nor
//! change can go negative.

use ed25519_dalek::{Signer, SIGNATURE_LENGTH};
use renterbind_currency::Currency;
use tracing::{debug, warn};

use crate::encoding::SiaEncode;
use crate::error::{Result, TxnError};
use crate::keys::KeySource;
use crate::types::{
    OutputId, PublicKey, SiacoinInput, SiacoinOutput, Transaction, TransactionSignature,
    UnlockConditions, UnlockHash,
};

/// Fee recomputation stops after this many rounds even if still moving.
const MAX_FEE_ROUNDS: usize = 16;

/// Fee parameters for a [`TransactionBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Miner fee charged per encoded byte.
    pub fee_per_byte: Currency,

    /// Bytes added per input for the signature it will carry.
    pub signature_overhead: u64,
}

impl BuilderConfig {
    pub fn new(fee_per_byte: Currency) -> Self {
        Self {
            fee_per_byte,
            signature_overhead: placeholder_signature_len(),
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self::new(Currency::zero())
    }
}

/// Encoded size of one whole-transaction Ed25519 signature.
fn placeholder_signature_len() -> u64 {
    let placeholder = TransactionSignature {
        signature: vec![0u8; SIGNATURE_LENGTH],
        ..TransactionSignature::whole(OutputId::from_bytes([0u8; 32]))
    };
    placeholder.encoded_len() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Finalized,
}

/// Accumulates outputs and inputs, then finalizes and signs a transaction.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    config: BuilderConfig,
    txn: Transaction,
    state: State,
    input_total: Currency,
    output_total: Currency,
    fee: Currency,
    change: Currency,
    /// Signing key index per input, in input order.
    signing_keys: Vec<(OutputId, u64)>,
}

impl TransactionBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            txn: Transaction::default(),
            state: State::Open,
            input_total: Currency::zero(),
            output_total: Currency::zero(),
            fee: Currency::zero(),
            change: Currency::zero(),
            signing_keys: Vec::new(),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Finalized => Err(TxnError::AlreadyFinalized),
        }
    }

    fn required_fee(&self, txn: &Transaction) -> Currency {
        let overhead = self.config.signature_overhead * txn.siacoin_inputs.len() as u64;
        &self.config.fee_per_byte * (txn.encoded_len() as u64 + overhead)
    }

    /// Pay `amount` to `address`.
    pub fn add_output(&mut self, address: UnlockHash, amount: Currency) -> Result<()> {
        self.ensure_open()?;
        self.output_total += &amount;
        self.txn.siacoin_outputs.push(SiacoinOutput {
            value: amount,
            unlock_hash: address,
        });
        Ok(())
    }

    /// Spend the output `parent_id`, worth `value`, signed later with key
    /// `key_index`. Returns whether inputs now cover outputs plus the fee
    /// estimate.
    pub fn add_input(
        &mut self,
        parent_id: OutputId,
        value: Currency,
        public_key: PublicKey,
        key_index: u64,
    ) -> Result<bool> {
        self.ensure_open()?;
        if !public_key.is_ed25519() {
            return Err(TxnError::InvalidPublicKey(format!(
                "unsupported key {}",
                public_key
            )));
        }
        if self.signing_keys.iter().any(|(id, _)| *id == parent_id) {
            return Err(TxnError::DuplicateInput(parent_id));
        }

        self.txn.siacoin_inputs.push(SiacoinInput {
            parent_id,
            unlock_conditions: UnlockConditions::standard(public_key),
        });
        self.signing_keys.push((parent_id, key_index));
        self.input_total += &value;
        self.fee = self.required_fee(&self.txn);

        Ok(self.input_total >= &self.output_total + &self.fee)
    }

    fn with_fee_and_change(
        &self,
        fee: &Currency,
        leftover: &Currency,
        change_address: UnlockHash,
    ) -> Transaction {
        let mut txn = self.txn.clone();
        if !fee.is_zero() {
            txn.miner_fees.push(fee.clone());
        }
        let change = leftover.saturating_sub(fee);
        if !change.is_zero() {
            txn.siacoin_outputs.push(SiacoinOutput {
                value: change,
                unlock_hash: change_address,
            });
        }
        txn
    }

    /// Fee needed by the layout that charging `fee` produces, capped at the
    /// leftover.
    fn layout_fee(
        &self,
        fee: &Currency,
        leftover: &Currency,
        change_address: UnlockHash,
    ) -> Currency {
        let draft = self.with_fee_and_change(fee, leftover, change_address);
        self.required_fee(&draft).min(leftover.clone())
    }

    /// Commit the fee and send the remainder to `change_address`.
    pub fn finalize(&mut self, change_address: UnlockHash) -> Result<()> {
        self.ensure_open()?;
        let leftover = self.input_total.checked_sub(&self.output_total).ok_or_else(|| {
            TxnError::InsufficientInputs {
                inputs: self.input_total.clone(),
                outputs: self.output_total.clone(),
            }
        })?;

        // Iterate fee -> fee required by the layout it produces. Shrinking
        // change can shorten the encoding, so the sequence may step down as
        // well as up; when it cycles, the smallest fee that pays for its own
        // layout wins.
        let mut fee = Currency::zero();
        let mut covering: Option<Currency> = None;
        let mut settled = false;
        for _ in 0..MAX_FEE_ROUNDS {
            let required = self.layout_fee(&fee, &leftover, change_address);
            if required <= fee && covering.as_ref().map_or(true, |c| fee < *c) {
                covering = Some(fee.clone());
            }
            if required == fee {
                settled = true;
                break;
            }
            fee = required;
        }
        if !settled {
            fee = covering.unwrap_or_else(|| leftover.clone());
            warn!(%fee, "fee did not settle; using smallest covering estimate");
        }

        self.txn = self.with_fee_and_change(&fee, &leftover, change_address);
        self.change = leftover.saturating_sub(&fee);
        self.fee = fee;
        self.state = State::Finalized;
        debug!(
            inputs = self.txn.siacoin_inputs.len(),
            outputs = self.txn.siacoin_outputs.len(),
            fee = %self.fee,
            change = %self.change,
            "finalized transaction"
        );
        Ok(())
    }

    /// Attach a whole-transaction signature to every input, replacing any
    /// earlier signature for the same input.
    pub fn sign(&mut self, keys: &impl KeySource) -> Result<()> {
        let mut signatures = Vec::with_capacity(self.signing_keys.len());
        for &(parent_id, index) in &self.signing_keys {
            let key = keys.signing_key(index);
            let public_key = PublicKey::ed25519(key.verifying_key().to_bytes());
            let expected = self
                .txn
                .siacoin_inputs
                .iter()
                .find(|input| input.parent_id == parent_id)
                .and_then(|input| input.unlock_conditions.public_keys.first());
            if expected != Some(&public_key) {
                return Err(TxnError::KeyMismatch { parent_id, index });
            }

            let mut sig = TransactionSignature::whole(parent_id);
            let hash = self.txn.sig_hash(&sig);
            sig.signature = key.sign(&hash).to_bytes().to_vec();
            signatures.push(sig);
        }

        for sig in signatures {
            let existing = self
                .txn
                .transaction_signatures
                .iter_mut()
                .find(|s| s.parent_id == sig.parent_id);
            match existing {
                Some(slot) => *slot = sig,
                None => self.txn.transaction_signatures.push(sig),
            }
        }
        debug!(
            signatures = self.txn.transaction_signatures.len(),
            "signed transaction"
        );
        Ok(())
    }

    /// JSON form of the current draft, in either state.
    pub fn serialize(&self) -> Result<String> {
        self.txn.to_json()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.txn
    }

    pub fn into_transaction(self) -> Transaction {
        self.txn
    }

    /// Current fee: the running estimate while open, the committed fee after.
    pub fn fee(&self) -> &Currency {
        &self.fee
    }

    /// Change sent back at finalization; zero while open.
    pub fn change(&self) -> &Currency {
        &self.change
    }

    pub fn input_total(&self) -> &Currency {
        &self.input_total
    }

    /// Total of the requested outputs, excluding change.
    pub fn output_total(&self) -> &Currency {
        &self.output_total
    }

    pub fn is_finalized(&self) -> bool {
        self.state == State::Finalized
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Seed;

    fn seed() -> Seed {
        Seed::from_bytes([42u8; 32])
    }

    fn id(n: u8) -> OutputId {
        OutputId::from_bytes([n; 32])
    }

    fn builder(rate: u64) -> TransactionBuilder {
        TransactionBuilder::new(BuilderConfig::new(Currency::from(rate)))
    }

    #[test]
    fn placeholder_signature_size() {
        // id + index + timelock + covered fields + prefixed 64-byte signature
        assert_eq!(placeholder_signature_len(), 32 + 8 + 8 + 1 + 8 + 64);
    }

    #[test]
    fn change_is_leftover_minus_final_fee() {
        let seed = seed();
        let mut b = builder(1);
        b.add_output(seed.address(10), Currency::from(1000u64)).unwrap();
        assert!(b
            .add_input(id(1), Currency::from(2000u64), seed.public_key(0), 0)
            .unwrap());
        b.finalize(seed.address(11)).unwrap();

        let txn = b.transaction();
        let fee = b.fee().clone();
        assert!(!fee.is_zero());
        assert_eq!(txn.miner_fees, vec![fee.clone()]);
        assert_eq!(txn.siacoin_outputs.len(), 2);
        let change = &txn.siacoin_outputs[1];
        assert_eq!(change.unlock_hash, seed.address(11));
        assert_eq!(
            change.value,
            Currency::from(1000u64).checked_sub(&fee).unwrap()
        );

        // The fee pays for the final layout.
        let overhead = b.config().signature_overhead;
        let required = &Currency::from(1u64) * (txn.encoded_len() as u64 + overhead);
        assert_eq!(fee, required);
        assert_eq!(txn.output_total() + txn.fee_total(), Currency::from(2000u64));
    }

    #[test]
    fn fee_follows_change_across_encoding_width() {
        // Change values straddle 255/256, where the change output's encoding
        // loses a byte as the fee grows.
        let seed = seed();
        for extra in 590u64..640 {
            let mut b = builder(1);
            b.add_output(seed.address(1), Currency::from(1000u64)).unwrap();
            b.add_input(id(1), Currency::from(1000 + extra), seed.public_key(0), 0)
                .unwrap();
            b.finalize(seed.address(2)).unwrap();

            let txn = b.transaction();
            assert_eq!(b.fee(), &b.required_fee(txn), "extra={}", extra);
            assert_eq!(
                b.fee().clone() + b.change().clone(),
                Currency::from(extra),
                "extra={}",
                extra
            );
        }
    }

    #[test]
    fn coverage_is_reported_on_the_reaching_input() {
        let seed = seed();
        let mut b = builder(0);
        b.add_output(seed.address(1), Currency::from(1000u64)).unwrap();
        let results: Vec<bool> = [400u64, 300, 300]
            .iter()
            .enumerate()
            .map(|(i, v)| {
                b.add_input(id(i as u8), Currency::from(*v), seed.public_key(0), 0)
                    .unwrap()
            })
            .collect();
        assert_eq!(results, vec![false, false, true]);
    }

    #[test]
    fn coverage_with_fee_is_exact() {
        let seed = seed();
        let mut b = builder(1);
        b.add_output(seed.address(1), Currency::from(1000u64)).unwrap();
        assert!(!b
            .add_input(id(1), Currency::from(100u64), seed.public_key(0), 0)
            .unwrap());

        // Values in 256..=65535 encode to the same width, so the estimate
        // does not depend on the exact value chosen.
        let mut probe = b.clone();
        probe
            .add_input(id(2), Currency::from(1000u64), seed.public_key(0), 0)
            .unwrap();
        let fee = probe.fee().clone();
        let exact = (Currency::from(1000u64) + fee)
            .checked_sub(&Currency::from(100u64))
            .unwrap();

        let mut short = b.clone();
        let one_less = exact.checked_sub(&Currency::from(1u64)).unwrap();
        assert!(!short
            .add_input(id(2), one_less, seed.public_key(0), 0)
            .unwrap());
        assert!(b.add_input(id(2), exact, seed.public_key(0), 0).unwrap());
    }

    #[test]
    fn underfunded_draft_fails() {
        let seed = seed();
        let mut b = builder(0);
        b.add_output(seed.address(1), Currency::from(10u64)).unwrap();
        b.add_input(id(1), Currency::from(9u64), seed.public_key(0), 0)
            .unwrap();
        let err = b.finalize(seed.address(2)).unwrap_err();
        assert!(matches!(err, TxnError::InsufficientInputs { .. }));
        assert!(err.to_string().contains("insufficient inputs"));
        assert!(!b.is_finalized());
    }

    #[test]
    fn fee_is_capped_at_leftover() {
        let seed = seed();
        let mut b = builder(1000);
        b.add_output(seed.address(1), Currency::from(1000u64)).unwrap();
        b.add_input(id(1), Currency::from(1100u64), seed.public_key(0), 0)
            .unwrap();
        b.finalize(seed.address(2)).unwrap();
        assert_eq!(b.fee(), &Currency::from(100u64));
        assert!(b.change().is_zero());
        assert_eq!(b.transaction().siacoin_outputs.len(), 1);
        assert_eq!(b.transaction().miner_fees, vec![Currency::from(100u64)]);
    }

    #[test]
    fn exact_spend_without_fee_has_no_extras() {
        let seed = seed();
        let mut b = builder(0);
        b.add_output(seed.address(1), Currency::from(5u64)).unwrap();
        b.add_input(id(1), Currency::from(5u64), seed.public_key(0), 0)
            .unwrap();
        b.finalize(seed.address(2)).unwrap();
        assert!(b.transaction().miner_fees.is_empty());
        assert_eq!(b.transaction().siacoin_outputs.len(), 1);
    }

    #[test]
    fn mutation_after_finalize_fails() {
        let seed = seed();
        let mut b = builder(0);
        b.finalize(seed.address(0)).unwrap();
        assert!(matches!(
            b.add_output(seed.address(1), Currency::from(1u64)),
            Err(TxnError::AlreadyFinalized)
        ));
        assert!(matches!(
            b.add_input(id(1), Currency::from(1u64), seed.public_key(0), 0),
            Err(TxnError::AlreadyFinalized)
        ));
        assert!(matches!(
            b.finalize(seed.address(0)),
            Err(TxnError::AlreadyFinalized)
        ));
    }

    #[test]
    fn non_ed25519_keys_are_rejected() {
        let mut b = builder(0);
        let key: PublicKey = format!("secp256k1:{}", "00".repeat(33)).parse().unwrap();
        let err = b.add_input(id(1), Currency::from(1u64), key, 0).unwrap_err();
        assert!(err.to_string().starts_with("invalid public key"));
        assert!(b.transaction().siacoin_inputs.is_empty());
        assert!(b.input_total().is_zero());
    }

    #[test]
    fn duplicate_inputs_are_rejected() {
        let seed = seed();
        let mut b = builder(0);
        b.add_input(id(1), Currency::from(1u64), seed.public_key(0), 0)
            .unwrap();
        assert!(matches!(
            b.add_input(id(1), Currency::from(1u64), seed.public_key(1), 1),
            Err(TxnError::DuplicateInput(_))
        ));
        assert_eq!(b.input_total(), &Currency::from(1u64));
    }

    #[test]
    fn signatures_verify_and_resigning_replaces() {
        let seed = seed();
        let mut b = builder(1);
        b.add_output(seed.address(9), Currency::from(500u64)).unwrap();
        b.add_input(id(1), Currency::from(600u64), seed.public_key(0), 0)
            .unwrap();
        b.add_input(id(2), Currency::from(700u64), seed.public_key(3), 3)
            .unwrap();
        b.finalize(seed.address(8)).unwrap();

        b.sign(&seed).unwrap();
        b.sign(&seed).unwrap();
        let txn = b.transaction();
        assert_eq!(txn.transaction_signatures.len(), 2);
        txn.verify_signatures().unwrap();

        let mut tampered = txn.clone();
        tampered.miner_fees[0] = Currency::from(1u64);
        assert!(tampered.verify_signatures().is_err());
    }

    #[test]
    fn wrong_seed_is_a_key_mismatch() {
        let seed = seed();
        let mut b = builder(0);
        b.add_input(id(1), Currency::from(1u64), seed.public_key(0), 5)
            .unwrap();
        assert!(matches!(
            b.sign(&seed),
            Err(TxnError::KeyMismatch { index: 5, .. })
        ));
    }

    #[test]
    fn draft_serializes_while_open() {
        let seed = seed();
        let mut b = builder(0);
        b.add_output(seed.address(1), Currency::from(3u64)).unwrap();
        let json = b.serialize().unwrap();
        let parsed = Transaction::from_json(&json).unwrap();
        assert_eq!(&parsed, b.transaction());
    }
}
