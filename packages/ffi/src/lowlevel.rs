//! Contract formation and sector-level sessions.

use std::ffi::c_char;
use std::sync::Arc;

use parking_lot::Mutex;
use renterbind_core::{
    BindingError, BufferRef, BufferView, ContextKey, Handle, RawContract, SectorRoot, KEY_SIZE,
};
use renterbind_currency::parse;
use tracing::debug;

use crate::contract::read_contract;
use crate::guard::{c_str, guarded, read_array, write_out};
use crate::state::{self, load_client, load_session, release_kind, store, Resource, ERRORS};

/// Connect to the chain daemon at `addr`.
///
/// # Safety
///
/// `addr` and `password` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn us_ll_client_init(
    ctx: usize,
    addr: *const c_char,
    password: *const c_char,
) -> Handle {
    guarded(ctx, "us_ll_client_init", Handle::NULL, || {
        let addr = c_str(addr, "addr")?;
        let password = c_str(password, "password")?;
        let client = state::backend().connect(addr, password)?;
        store(Resource::Client(client))
    })
}

/// Release a client handle.
#[no_mangle]
pub extern "C" fn us_ll_client_free(client: Handle) {
    if let Err(e) = release_kind(client, "client") {
        ERRORS.record(ContextKey::GLOBAL, "us_ll_client_free", &e);
    }
}

/// Current chain height as seen by `client`.
///
/// # Safety
///
/// `out` must be null or valid for writing a `uint64_t`.
#[no_mangle]
pub unsafe extern "C" fn us_ll_chain_height(ctx: usize, client: Handle, out: *mut u64) -> bool {
    guarded(ctx, "us_ll_chain_height", false, || {
        let height = load_client(client)?.chain_height()?;
        write_out(out, height, "out")?;
        Ok(true)
    })
}

/// Form a contract with the host whose key starts with `host`, funded with
/// `funds` (currency text) for `duration` blocks. The renter key is derived
/// from the 32-byte `key_seed`.
///
/// # Safety
///
/// `host` and `funds` must be null or NUL-terminated strings; `key_seed` must
/// be null or point to 32 bytes; `out` must be null or valid for writing a
/// `contract_t`.
#[no_mangle]
pub unsafe extern "C" fn us_ll_form_contract(
    ctx: usize,
    client: Handle,
    host: *const c_char,
    key_seed: *const u8,
    funds: *const c_char,
    duration: u64,
    out: *mut RawContract,
) -> bool {
    guarded(ctx, "us_ll_form_contract", false, || {
        let client = load_client(client)?;
        let host = c_str(host, "host")?;
        let seed: [u8; KEY_SIZE] = read_array(key_seed, "key_seed")?;
        let funds = parse(c_str(funds, "funds")?)?;
        if out.is_null() {
            return Err(BindingError::NullPointer("contract").into());
        }
        let contract = client.form_contract(host, &seed, &funds, duration)?;
        write_out(out, contract.into(), "contract")?;
        Ok(true)
    })
}

/// Open a sector session with `host` under `contract`.
///
/// # Safety
///
/// `host` must be null or a NUL-terminated string; `contract` must be null or
/// point to a `contract_t`.
#[no_mangle]
pub unsafe extern "C" fn us_ll_new_session(
    ctx: usize,
    client: Handle,
    host: *const c_char,
    contract: *const RawContract,
) -> Handle {
    guarded(ctx, "us_ll_new_session", Handle::NULL, || {
        let client = load_client(client)?;
        let host = c_str(host, "host")?;
        let contract = read_contract(contract)?;
        let session = client.new_session(host, &contract)?;
        store(Resource::Session(Arc::new(Mutex::new(session))))
    })
}

/// Upload one sector of `len` bytes from `sector` and write its root to
/// `out_root[32]`.
///
/// # Safety
///
/// `sector` must point to at least `len` readable bytes; `out_root` must be
/// null or point to 32 writable bytes.
#[no_mangle]
pub unsafe extern "C" fn us_ll_upload(
    ctx: usize,
    session: Handle,
    sector: *const u8,
    len: usize,
    out_root: *mut u8,
) -> bool {
    guarded(ctx, "us_ll_upload", false, || {
        let session = load_session(session)?;
        let sector = BufferRef::from_raw_parts(sector, len, "sector")?;
        let mut root_out = BufferView::from_raw_parts(out_root, KEY_SIZE, "out_root")?;
        let root = session.lock().append_sector(&sector)?;
        root_out.copy_from_slice(&root);
        Ok(true)
    })
}

/// Read `length` bytes at `offset` of the sector with `root` into `buf`.
/// Returns the number of bytes read, or `-1`.
///
/// # Safety
///
/// `root` must be null or point to 32 bytes; `buf` must point to at least
/// `length` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn us_ll_download(
    ctx: usize,
    session: Handle,
    root: *const u8,
    buf: *mut u8,
    offset: u32,
    length: u32,
) -> isize {
    guarded(ctx, "us_ll_download", -1, || {
        let session = load_session(session)?;
        let root: SectorRoot = read_array(root, "root")?;
        let mut dst = BufferView::from_raw_parts(buf, length as usize, "buf")?;
        session.lock().read_sector(&root, offset, &mut dst)?;
        Ok(dst.len() as isize)
    })
}

/// Close and release a session. Null or already-closed handles are ignored.
#[no_mangle]
pub extern "C" fn us_ll_session_close(ctx: usize, session: Handle) -> bool {
    guarded(ctx, "us_ll_session_close", false, || {
        if let Some(Resource::Session(session)) = release_kind(session, "session")? {
            session.lock().close()?;
            debug!("closed session");
        }
        Ok(true)
    })
}
