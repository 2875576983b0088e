//! Narrow interfaces to the storage layer.
//!
//! Host discovery, contract negotiation, sector transfer and file striping
//! all live behind these traits. The binding layer only sequences calls and
//! passes failures back verbatim as [`CollaboratorError`].

use std::sync::Arc;

use thiserror::Error;

use crate::contract::Contract;
use renterbind_currency::Currency;

/// A host's 32-byte public key.
pub type HostKey = [u8; 32];

/// Content-derived root of one sector.
pub type SectorRoot = [u8; 32];

/// A failure reported by the storage layer, carried as text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CollaboratorError {
    message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(e: std::io::Error) -> Self {
        CollaboratorError::new(e.to_string())
    }
}

/// Result type alias for storage-layer calls.
pub type StorageResult<T> = std::result::Result<T, CollaboratorError>;

/// Reference point for [`OpenFile::seek`], numbered like `SEEK_SET`,
/// `SEEK_CUR` and `SEEK_END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl Whence {
    pub fn from_raw(raw: i32) -> Option<Whence> {
        match raw {
            0 => Some(Whence::Start),
            1 => Some(Whence::Current),
            2 => Some(Whence::End),
            _ => None,
        }
    }
}

/// Entry point that produces the top-level storage objects.
pub trait Backend: Send + Sync {
    /// Connect to a chain/wallet daemon.
    fn connect(&self, addr: &str, password: &str) -> StorageResult<Arc<dyn StorageClient>>;

    /// Create an empty host set at the daemon's current chain height.
    fn host_set(&self, addr: &str, password: &str) -> StorageResult<Arc<dyn HostSet>>;

    /// Open the file system whose metadata lives under `root`.
    fn file_system(&self, root: &str, hosts: Arc<dyn HostSet>)
        -> StorageResult<Arc<dyn FileSystem>>;
}

/// Low-level access to contracts and hosts.
pub trait StorageClient: Send + Sync {
    fn chain_height(&self) -> StorageResult<u64>;

    /// Resolve a (possibly abbreviated) hex host key.
    fn lookup_host(&self, prefix: &str) -> StorageResult<HostKey>;

    /// Form a contract with the host matching `host_prefix`, funded with
    /// `funds` and lasting `duration` blocks from the current height.
    fn form_contract(
        &self,
        host_prefix: &str,
        renter_seed: &[u8; 32],
        funds: &Currency,
        duration: u64,
    ) -> StorageResult<Contract>;

    /// Open a sector-level session with a host under an existing contract.
    fn new_session(&self, host_prefix: &str, contract: &Contract)
        -> StorageResult<Box<dyn Session>>;
}

/// A live connection to one host under one contract.
pub trait Session: Send {
    /// Append exactly one sector; returns its content root.
    fn append_sector(&mut self, sector: &[u8]) -> StorageResult<SectorRoot>;

    /// Read `dst.len()` bytes starting at `offset` of the sector with `root`.
    fn read_sector(&mut self, root: &SectorRoot, offset: u32, dst: &mut [u8])
        -> StorageResult<()>;

    fn close(&mut self) -> StorageResult<()>;
}

/// The set of hosts a file system stripes across.
pub trait HostSet: Send + Sync {
    fn add_host(&self, contract: &Contract) -> StorageResult<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A file system striped across a [`HostSet`].
pub trait FileSystem: Send + Sync {
    /// Create (or truncate) `name`, requiring at least `min_hosts` hosts.
    fn create(&self, name: &str, min_hosts: usize) -> StorageResult<Box<dyn OpenFile>>;

    fn open(&self, name: &str) -> StorageResult<Box<dyn OpenFile>>;

    /// Flush uncommitted writes and shut down.
    fn close(&self) -> StorageResult<()>;

    /// Create `name` with `data` in one call.
    fn upload(&self, name: &str, data: &[u8], min_hosts: usize) -> StorageResult<()> {
        let mut file = self.create(name, min_hosts)?;
        let mut written = 0;
        while written < data.len() {
            let n = file.write(&data[written..])?;
            if n == 0 {
                return Err(CollaboratorError::new("short write"));
            }
            written += n;
        }
        file.close()
    }

    /// Read all of `name`.
    fn download(&self, name: &str) -> StorageResult<Vec<u8>> {
        let mut file = self.open(name)?;
        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        file.close()?;
        Ok(out)
    }
}

/// An open file. `read` returning `0` means end of file.
pub trait OpenFile: Send {
    fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize>;

    fn write(&mut self, buf: &[u8]) -> StorageResult<usize>;

    /// Returns the new absolute position.
    fn seek(&mut self, offset: i64, whence: Whence) -> StorageResult<u64>;

    fn close(&mut self) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whence_matches_c_numbering() {
        assert_eq!(Whence::from_raw(0), Some(Whence::Start));
        assert_eq!(Whence::from_raw(1), Some(Whence::Current));
        assert_eq!(Whence::from_raw(2), Some(Whence::End));
        assert_eq!(Whence::from_raw(3), None);
        assert_eq!(Whence::from_raw(-1), None);
    }

    #[test]
    fn collaborator_error_is_verbatim() {
        let e = CollaboratorError::new("contract has expired");
        assert_eq!(e.to_string(), "contract has expired");
        assert_eq!(e.message(), "contract has expired");
    }
}
