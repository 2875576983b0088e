//! Transaction builder handles.

use std::ffi::{c_char, c_int};
use std::sync::Arc;

use parking_lot::Mutex;
use renterbind_core::{ContextKey, Handle, KEY_SIZE};
use renterbind_currency::parse;
use renterbind_txn::{
    BuilderConfig, OutputId, PublicKey, Seed, TransactionBuilder, UnlockHash,
};

use crate::guard::{c_str, guarded, into_c_string, read_array};
use crate::state::{load_transaction, release_kind, store, Resource, ERRORS};

/// Start a transaction paying `fee_per_byte` (currency text) per byte.
///
/// # Safety
///
/// `fee_per_byte` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn us_txn_new(ctx: usize, fee_per_byte: *const c_char) -> Handle {
    guarded(ctx, "us_txn_new", Handle::NULL, || {
        let rate = parse(c_str(fee_per_byte, "fee_per_byte")?)?;
        let builder = TransactionBuilder::new(BuilderConfig::new(rate));
        store(Resource::Transaction(Arc::new(Mutex::new(builder))))
    })
}

/// Pay `amount` (currency text) to `address` (76 hex characters).
///
/// # Safety
///
/// `address` and `amount` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn us_txn_add_output(
    ctx: usize,
    txn: Handle,
    address: *const c_char,
    amount: *const c_char,
) -> bool {
    guarded(ctx, "us_txn_add_output", false, || {
        let txn = load_transaction(txn)?;
        let address: UnlockHash = c_str(address, "address")?.parse()?;
        let amount = parse(c_str(amount, "amount")?)?;
        txn.lock().add_output(address, amount)?;
        Ok(true)
    })
}

/// Spend output `parent_id` (hex) worth `value` (currency text), unlocked by
/// `public_key` (`ed25519:<hex>`) and signed later with key `key_index`.
///
/// Returns `1` once inputs cover outputs plus the fee estimate, `0` while
/// they do not, and `-1` on error.
///
/// # Safety
///
/// `parent_id`, `value` and `public_key` must be null or NUL-terminated
/// strings.
#[no_mangle]
pub unsafe extern "C" fn us_txn_add_input(
    ctx: usize,
    txn: Handle,
    parent_id: *const c_char,
    value: *const c_char,
    public_key: *const c_char,
    key_index: u64,
) -> c_int {
    guarded(ctx, "us_txn_add_input", -1, || {
        let txn = load_transaction(txn)?;
        let parent_id: OutputId = c_str(parent_id, "parent_id")?.parse()?;
        let value = parse(c_str(value, "value")?)?;
        let public_key: PublicKey = c_str(public_key, "public_key")?.parse()?;
        let covered = txn
            .lock()
            .add_input(parent_id, value, public_key, key_index)?;
        Ok(c_int::from(covered))
    })
}

/// Commit the fee and send any remainder to `change_address`.
///
/// # Safety
///
/// `change_address` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn us_txn_finalize(
    ctx: usize,
    txn: Handle,
    change_address: *const c_char,
) -> bool {
    guarded(ctx, "us_txn_finalize", false, || {
        let txn = load_transaction(txn)?;
        let change: UnlockHash = c_str(change_address, "change_address")?.parse()?;
        txn.lock().finalize(change)?;
        Ok(true)
    })
}

/// Sign every input with keys derived from the 32-byte `seed`.
///
/// # Safety
///
/// `seed` must be null or point to 32 readable bytes.
#[no_mangle]
pub unsafe extern "C" fn us_txn_sign(ctx: usize, txn: Handle, seed: *const u8) -> bool {
    guarded(ctx, "us_txn_sign", false, || {
        let txn = load_transaction(txn)?;
        let seed = Seed::from_bytes(read_array::<KEY_SIZE>(seed, "seed")?);
        txn.lock().sign(&seed)?;
        Ok(true)
    })
}

/// JSON form of the transaction, finalized or not. Free with
/// `us_string_free`.
#[no_mangle]
pub extern "C" fn us_txn_serialize(ctx: usize, txn: Handle) -> *mut c_char {
    guarded(ctx, "us_txn_serialize", std::ptr::null_mut(), || {
        let json = load_transaction(txn)?.lock().serialize()?;
        into_c_string(json)
    })
}

/// Release a transaction handle.
#[no_mangle]
pub extern "C" fn us_txn_free(txn: Handle) {
    if let Err(e) = release_kind(txn, "transaction") {
        ERRORS.record(ContextKey::GLOBAL, "us_txn_free", &e);
    }
}
