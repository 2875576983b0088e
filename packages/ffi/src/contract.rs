use std::ffi::c_char;

use renterbind_core::{
    BindingError, BufferRef, BufferView, Contract, RawContract, CONTRACT_SIZE,
};

use crate::guard::{c_str, guarded, into_c_string, write_out};

/// Fill `out` from a 96-byte record (`host key || id || renter seed`).
///
/// # Safety
///
/// `out` must be null or valid for writing a `contract_t`; `data` must be
/// null or point to 96 readable bytes.
#[no_mangle]
pub unsafe extern "C" fn us_contract_init(
    ctx: usize,
    out: *mut RawContract,
    data: *const u8,
) -> bool {
    guarded(ctx, "us_contract_init", false, || {
        let bytes = BufferRef::from_raw_parts(data, CONTRACT_SIZE, "data")?;
        let contract = Contract::from_bytes(&bytes)?;
        write_out(out, contract.into(), "contract")?;
        Ok(true)
    })
}

/// Write the 96-byte record for `contract` into `out`.
///
/// # Safety
///
/// `contract` must be null or point to a `contract_t`; `out` must be null or
/// point to 96 writable bytes.
#[no_mangle]
pub unsafe extern "C" fn us_contract_encode(
    ctx: usize,
    contract: *const RawContract,
    out: *mut u8,
) -> bool {
    guarded(ctx, "us_contract_encode", false, || {
        let contract = read_contract(contract)?;
        let mut dst = BufferView::from_raw_parts(out, CONTRACT_SIZE, "out")?;
        dst.copy_from_slice(&contract.to_bytes());
        Ok(true)
    })
}

/// Parse the 192-character hex form of a contract into `out`.
///
/// # Safety
///
/// `text` must be null or a NUL-terminated string; `out` must be null or
/// valid for writing a `contract_t`.
#[no_mangle]
pub unsafe extern "C" fn us_contract_from_hex(
    ctx: usize,
    text: *const c_char,
    out: *mut RawContract,
) -> bool {
    guarded(ctx, "us_contract_from_hex", false, || {
        let contract = Contract::from_hex(c_str(text, "text")?)?;
        write_out(out, contract.into(), "contract")?;
        Ok(true)
    })
}

/// The hex form of `contract`. Free with `us_string_free`.
///
/// # Safety
///
/// `contract` must be null or point to a `contract_t`.
#[no_mangle]
pub unsafe extern "C" fn us_contract_to_hex(
    ctx: usize,
    contract: *const RawContract,
) -> *mut c_char {
    guarded(ctx, "us_contract_to_hex", std::ptr::null_mut(), || {
        into_c_string(read_contract(contract)?.to_hex())
    })
}

/// Read a `contract_t` argument.
///
/// # Safety
///
/// `contract` must be null or point to a `contract_t`.
pub(crate) unsafe fn read_contract(contract: *const RawContract) -> crate::Result<Contract> {
    contract
        .as_ref()
        .map(|raw| Contract::from(*raw))
        .ok_or_else(|| BindingError::NullPointer("contract").into())
}
