//! Host sets, file systems and open files.

use std::ffi::{c_char, c_int};
use std::sync::Arc;

use parking_lot::Mutex;
use renterbind_core::{
    BindingError, BufferRef, BufferView, ContextKey, Handle, RawContract, Whence,
};
use tracing::debug;

use crate::contract::read_contract;
use crate::guard::{c_str, guarded, non_negative};
use crate::into_c_bytes;
use crate::state::{
    self, load_file, load_file_system, load_host_set, release_kind, store, Resource, ERRORS,
};

/// Create an empty host set using the daemon at `addr`.
///
/// # Safety
///
/// `addr` and `password` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn us_hostset_init(
    ctx: usize,
    addr: *const c_char,
    password: *const c_char,
) -> Handle {
    guarded(ctx, "us_hostset_init", Handle::NULL, || {
        let addr = c_str(addr, "addr")?;
        let password = c_str(password, "password")?;
        let hosts = state::backend().host_set(addr, password)?;
        store(Resource::HostSet(hosts))
    })
}

/// Add the host of `contract` to the set.
///
/// # Safety
///
/// `contract` must be null or point to a `contract_t`.
#[no_mangle]
pub unsafe extern "C" fn us_hostset_add(
    ctx: usize,
    hosts: Handle,
    contract: *const RawContract,
) -> bool {
    guarded(ctx, "us_hostset_add", false, || {
        let hosts = load_host_set(hosts)?;
        hosts.add_host(&read_contract(contract)?)?;
        Ok(true)
    })
}

/// Release a host set handle. File systems opened on it keep working.
#[no_mangle]
pub extern "C" fn us_hostset_free(hosts: Handle) {
    if let Err(e) = release_kind(hosts, "host set") {
        ERRORS.record(ContextKey::GLOBAL, "us_hostset_free", &e);
    }
}

/// Open the file system whose metadata lives under `root`, striping over
/// `hosts`.
///
/// # Safety
///
/// `root` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn us_fs_init(ctx: usize, root: *const c_char, hosts: Handle) -> Handle {
    guarded(ctx, "us_fs_init", Handle::NULL, || {
        let root = c_str(root, "root")?;
        let hosts = load_host_set(hosts)?;
        let fs = state::backend().file_system(root, hosts)?;
        store(Resource::FileSystem(fs))
    })
}

/// Flush and close a file system, releasing its handle.
#[no_mangle]
pub extern "C" fn us_fs_close(ctx: usize, fs: Handle) -> bool {
    guarded(ctx, "us_fs_close", false, || {
        if let Some(Resource::FileSystem(fs)) = release_kind(fs, "file system")? {
            fs.close()?;
            debug!("closed file system");
        }
        Ok(true)
    })
}

/// Create (or truncate) `name`, stored on at least `min_hosts` hosts.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn us_fs_create(
    ctx: usize,
    fs: Handle,
    name: *const c_char,
    min_hosts: c_int,
) -> Handle {
    guarded(ctx, "us_fs_create", Handle::NULL, || {
        let fs = load_file_system(fs)?;
        let name = c_str(name, "name")?;
        let min_hosts = non_negative(min_hosts.into(), "min_hosts")?;
        let file = fs.create(name, min_hosts)?;
        store(Resource::File(Arc::new(Mutex::new(file))))
    })
}

/// Open `name` for reading.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn us_fs_open(ctx: usize, fs: Handle, name: *const c_char) -> Handle {
    guarded(ctx, "us_fs_open", Handle::NULL, || {
        let fs = load_file_system(fs)?;
        let name = c_str(name, "name")?;
        let file = fs.open(name)?;
        store(Resource::File(Arc::new(Mutex::new(file))))
    })
}

/// Create `name` holding the `len` bytes at `data`.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string; `data` must point to at
/// least `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn us_fs_upload(
    ctx: usize,
    fs: Handle,
    name: *const c_char,
    data: *const u8,
    len: usize,
    min_hosts: c_int,
) -> bool {
    guarded(ctx, "us_fs_upload", false, || {
        let fs = load_file_system(fs)?;
        let name = c_str(name, "name")?;
        let data = BufferRef::from_raw_parts(data, len, "data")?;
        let min_hosts = non_negative(min_hosts.into(), "min_hosts")?;
        fs.upload(name, &data, min_hosts)?;
        Ok(true)
    })
}

/// Read all of `name`. The length is written to `out_len`; free the result
/// with `us_bytes_free(ptr, *out_len)`.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string; `out_len` must be null or
/// valid for writing a `size_t`.
#[no_mangle]
pub unsafe extern "C" fn us_fs_download(
    ctx: usize,
    fs: Handle,
    name: *const c_char,
    out_len: *mut usize,
) -> *mut u8 {
    guarded(ctx, "us_fs_download", std::ptr::null_mut(), || {
        let fs = load_file_system(fs)?;
        let name = c_str(name, "name")?;
        if out_len.is_null() {
            return Err(BindingError::NullPointer("out_len").into());
        }
        into_c_bytes(fs.download(name)?, out_len)
    })
}

/// Read up to `len` bytes into `buf`. Returns the count (`0` at end of
/// file) or `-1`.
///
/// # Safety
///
/// `buf` must point to at least `len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn us_file_read(ctx: usize, file: Handle, buf: *mut u8, len: usize) -> isize {
    guarded(ctx, "us_file_read", -1, || {
        let file = load_file(file)?;
        let mut dst = BufferView::from_raw_parts(buf, len, "buf")?;
        let n = file.lock().read(&mut dst)?;
        Ok(n as isize)
    })
}

/// Write `len` bytes from `buf`. Returns the count or `-1`.
///
/// # Safety
///
/// `buf` must point to at least `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn us_file_write(
    ctx: usize,
    file: Handle,
    buf: *const u8,
    len: usize,
) -> isize {
    guarded(ctx, "us_file_write", -1, || {
        let file = load_file(file)?;
        let src = BufferRef::from_raw_parts(buf, len, "buf")?;
        let n = file.lock().write(&src)?;
        Ok(n as isize)
    })
}

/// Move the file position. `whence` is `0` (start), `1` (current) or `2`
/// (end). Returns the new position or `-1`.
#[no_mangle]
pub extern "C" fn us_file_seek(ctx: usize, file: Handle, offset: i64, whence: c_int) -> i64 {
    guarded(ctx, "us_file_seek", -1, || {
        let file = load_file(file)?;
        let whence = Whence::from_raw(whence)
            .ok_or_else(|| BindingError::InvalidArgument(format!("bad whence {}", whence)))?;
        let position = file.lock().seek(offset, whence)?;
        i64::try_from(position).map_err(|_| {
            BindingError::InvalidArgument(format!("position {} overflows", position)).into()
        })
    })
}

/// Close a file and release its handle.
#[no_mangle]
pub extern "C" fn us_file_close(ctx: usize, file: Handle) -> bool {
    guarded(ctx, "us_file_close", false, || {
        if let Some(Resource::File(file)) = release_kind(file, "file")? {
            file.lock().close()?;
        }
        Ok(true)
    })
}
