//! Process-wide binding state: the handle table, the error slots and the
//! installed storage backend.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use renterbind_core::{
    Backend, BindingConfig, BindingError, ErrorContext, FileSystem, Handle, HandleRegistry,
    HostSet, MemoryBackend, OpenFile, Session, StorageClient,
};
use renterbind_txn::TransactionBuilder;
use tracing::debug;

use crate::error::Result;

/// Every object a foreign caller can hold a handle to.
#[derive(Clone)]
pub(crate) enum Resource {
    Client(Arc<dyn StorageClient>),
    Session(Arc<Mutex<Box<dyn Session>>>),
    HostSet(Arc<dyn HostSet>),
    FileSystem(Arc<dyn FileSystem>),
    File(Arc<Mutex<Box<dyn OpenFile>>>),
    Transaction(Arc<Mutex<TransactionBuilder>>),
}

impl Resource {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Resource::Client(_) => "client",
            Resource::Session(_) => "session",
            Resource::HostSet(_) => "host set",
            Resource::FileSystem(_) => "file system",
            Resource::File(_) => "file",
            Resource::Transaction(_) => "transaction",
        }
    }
}

lazy_static::lazy_static! {
    pub(crate) static ref CONFIG: BindingConfig = BindingConfig::from_env();
    pub(crate) static ref REGISTRY: HandleRegistry<Resource> =
        HandleRegistry::new(CONFIG.max_handles);
    pub(crate) static ref ERRORS: ErrorContext = ErrorContext::new();
    static ref BACKEND: RwLock<Arc<dyn Backend>> =
        RwLock::new(Arc::new(MemoryBackend::new(CONFIG.clone())));
    static ref MEMORY: RwLock<Option<MemoryBackend>> = RwLock::new(None);
}

/// Replace the storage backend used by every later constructor. Live
/// handles keep the backend they were created with.
pub fn install_backend(backend: Arc<dyn Backend>) {
    *BACKEND.write() = backend;
    *MEMORY.write() = None;
    debug!("installed storage backend");
}

pub(crate) fn install_memory(host_count: usize) {
    let memory = MemoryBackend::with_hosts(CONFIG.clone(), host_count);
    *BACKEND.write() = Arc::new(memory.clone());
    *MEMORY.write() = Some(memory);
    debug!(hosts = host_count, "installed in-memory backend");
}

pub(crate) fn backend() -> Arc<dyn Backend> {
    Arc::clone(&BACKEND.read())
}

pub(crate) fn memory() -> Option<MemoryBackend> {
    MEMORY.read().clone()
}

fn wrong_kind(handle: Handle, expected: &'static str, actual: &Resource) -> BindingError {
    BindingError::WrongHandleKind {
        handle,
        expected,
        actual: actual.kind(),
    }
}

macro_rules! loader {
    ($name:ident, $variant:ident, $ty:ty, $kind:literal) => {
        pub(crate) fn $name(handle: Handle) -> Result<$ty> {
            match REGISTRY.load(handle)? {
                Resource::$variant(inner) => Ok(inner),
                other => Err(wrong_kind(handle, $kind, &other).into()),
            }
        }
    };
}

loader!(load_client, Client, Arc<dyn StorageClient>, "client");
loader!(load_session, Session, Arc<Mutex<Box<dyn Session>>>, "session");
loader!(load_host_set, HostSet, Arc<dyn HostSet>, "host set");
loader!(load_file_system, FileSystem, Arc<dyn FileSystem>, "file system");
loader!(load_file, File, Arc<Mutex<Box<dyn OpenFile>>>, "file");
loader!(load_transaction, Transaction, Arc<Mutex<TransactionBuilder>>, "transaction");

pub(crate) fn store(resource: Resource) -> Result<Handle> {
    Ok(REGISTRY.store(resource)?)
}

/// Release `handle` if it holds a `expected` object.
///
/// Null, unknown and already-released handles are a no-op (`Ok(None)`). A
/// live handle of another kind is left in place and reported. Releasing a
/// handle also drops the error slot keyed by it; handle values are never
/// reused, so nothing could read that slot afterwards except a failure of
/// the releasing call itself.
pub(crate) fn release_kind(handle: Handle, expected: &'static str) -> Result<Option<Resource>> {
    if let Some(resource) = REGISTRY.release_if(handle, |r| r.kind() == expected) {
        ERRORS.clear(handle.into());
        return Ok(Some(resource));
    }
    match REGISTRY.with(handle, Resource::kind) {
        Ok(actual) => Err(BindingError::WrongHandleKind {
            handle,
            expected,
            actual,
        }
        .into()),
        Err(_) => Ok(None),
    }
}
