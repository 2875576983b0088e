//! renterbind-core: the cross-boundary resource layer.
//!
//! Foreign callers (C, Python, mobile runtimes) cannot hold Rust references.
//! This crate provides the pieces that let them drive stateful objects anyway:
//!
//! - [`HandleRegistry`]: opaque integer handles mapped to live objects
//! - [`ErrorContext`]: per-context last-error slots, tagged with the failing
//!   operation's name
//! - [`BufferView`] / [`BufferRef`]: in-place views over foreign memory
//! - [`Contract`]: the fixed 96-byte contract record
//!
//! The storage network itself is reached through the traits in [`backend`];
//! [`memory`] implements them in-process.
//!
//! ## Layering
//!
//! ```text
//! foreign caller
//!     │  handles, buffers, ctx keys
//!     ▼
//! binding surface (renterbind-ffi)
//!     │  HandleRegistry / ErrorContext / BufferView / Contract
//!     ▼
//! backend traits ──► MemoryBackend (or a networked implementation)
//! ```

pub mod backend;
pub mod buffer;
pub mod config;
pub mod contract;
pub mod error;
pub mod error_context;
pub mod handle;
pub mod memory;

pub use backend::{
    Backend, CollaboratorError, FileSystem, HostKey, HostSet, OpenFile, SectorRoot, Session,
    StorageClient, Whence,
};
pub use buffer::{BufferRef, BufferView};
pub use config::BindingConfig;
pub use contract::{Contract, ContractError, RawContract, CONTRACT_SIZE, KEY_SIZE};
pub use error::{BindingError, Result};
pub use error_context::{ContextKey, ErrorContext, ErrorRecord};
pub use handle::{Handle, HandleRegistry};
pub use memory::MemoryBackend;

/// BLAKE2b with a 32-byte digest. Must agree with the helper of the same
/// name in `renterbind-txn`.
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
