//! In-process storage layer.
//!
//! `MemoryBackend` implements every trait in [`crate::backend`] against
//! in-memory hosts. It follows the same rules a networked implementation
//! enforces (exact sector sizes, segment-aligned reads, contracts bound to
//! their host, redundancy checks on create) so the binding surface can be
//! exercised end to end without a network.
//!
//! Sector roots here are the BLAKE2b-256 of the sector, not a Merkle root.
//! Hosts answer scans after a configurable simulated latency; a host slower
//! than `host_scan_timeout` is treated as unreachable.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::backend::{
    Backend, CollaboratorError, FileSystem, HostKey, HostSet, OpenFile, SectorRoot, Session,
    StorageClient, StorageResult, Whence,
};
use crate::blake2b256;
use crate::config::BindingConfig;
use crate::contract::Contract;
use renterbind_currency::Currency;

fn fail<T>(message: impl Into<String>) -> StorageResult<T> {
    Err(CollaboratorError::new(message))
}

#[derive(Default)]
struct MemoryHost {
    latency: Mutex<Duration>,
    contracts: Mutex<HashSet<[u8; 32]>>,
    sectors: Mutex<HashMap<SectorRoot, Arc<Vec<u8>>>>,
}

type SharedFile = Arc<Mutex<Vec<u8>>>;

#[derive(Default)]
struct Volume {
    files: Mutex<HashMap<String, SharedFile>>,
}

struct Network {
    config: BindingConfig,
    height: AtomicU64,
    nonce: AtomicU64,
    hosts: RwLock<BTreeMap<HostKey, Arc<MemoryHost>>>,
    volumes: Mutex<HashMap<String, Arc<Volume>>>,
}

impl Network {
    fn lookup(&self, prefix: &str) -> StorageResult<(HostKey, Arc<MemoryHost>)> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return fail("empty host key prefix");
        }
        if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return fail(format!("host key prefix {:?} is not hex", prefix));
        }

        let (key, host) = {
            let hosts = self.hosts.read();
            let mut matches = hosts
                .iter()
                .filter(|(key, _)| hex::encode(key).starts_with(&prefix));
            match (matches.next(), matches.next()) {
                (Some((key, host)), None) => (*key, Arc::clone(host)),
                (None, _) => return fail(format!("no host matching {}", prefix)),
                (Some(_), Some(_)) => return fail(format!("ambiguous host prefix {}", prefix)),
            }
        };
        self.scan(&key, &host)?;
        Ok((key, host))
    }

    fn scan(&self, key: &HostKey, host: &MemoryHost) -> StorageResult<()> {
        let latency = *host.latency.lock();
        let timeout = self.config.host_scan_timeout;
        if latency > timeout {
            return fail(format!(
                "host {} did not respond within {:?}",
                hex::encode(key),
                timeout
            ));
        }
        Ok(())
    }

    fn host(&self, key: &HostKey) -> StorageResult<Arc<MemoryHost>> {
        self.hosts
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CollaboratorError::new(format!("unknown host {}", hex::encode(key))))
    }
}

/// An in-memory storage network.
///
/// Cloning shares the same hosts and volumes.
#[derive(Clone)]
pub struct MemoryBackend {
    network: Arc<Network>,
}

impl MemoryBackend {
    pub fn new(config: BindingConfig) -> Self {
        Self {
            network: Arc::new(Network {
                config,
                height: AtomicU64::new(0),
                nonce: AtomicU64::new(0),
                hosts: RwLock::new(BTreeMap::new()),
                volumes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A network with `count` hosts already announced.
    pub fn with_hosts(config: BindingConfig, count: usize) -> Self {
        let backend = Self::new(config);
        for _ in 0..count {
            backend.add_host();
        }
        backend
    }

    /// Announce a new host; its key is derived from its announcement order.
    pub fn add_host(&self) -> HostKey {
        let mut hosts = self.network.hosts.write();
        let index = hosts.len() as u64;
        let key = blake2b256(&[b"memory-host", &index.to_le_bytes()]);
        hosts.insert(key, Arc::new(MemoryHost::default()));
        debug!(host = %hex::encode(key), "announced memory host");
        key
    }

    /// Make `key` answer scans after `latency`. Returns false for an
    /// unknown host.
    pub fn set_host_latency(&self, key: &HostKey, latency: Duration) -> bool {
        match self.network.hosts.read().get(key) {
            Some(host) => {
                *host.latency.lock() = latency;
                true
            }
            None => false,
        }
    }

    pub fn host_keys(&self) -> Vec<HostKey> {
        self.network.hosts.read().keys().copied().collect()
    }

    /// Advance the chain by `blocks`.
    pub fn mine(&self, blocks: u64) {
        self.network.height.fetch_add(blocks, Ordering::SeqCst);
    }

    pub fn config(&self) -> &BindingConfig {
        &self.network.config
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(BindingConfig::default())
    }
}

fn check_daemon(addr: &str) -> StorageResult<()> {
    if addr.trim().is_empty() {
        return fail("empty daemon address");
    }
    Ok(())
}

impl Backend for MemoryBackend {
    fn connect(&self, addr: &str, _password: &str) -> StorageResult<Arc<dyn StorageClient>> {
        check_daemon(addr)?;
        Ok(Arc::new(MemoryClient {
            network: Arc::clone(&self.network),
        }))
    }

    fn host_set(&self, addr: &str, _password: &str) -> StorageResult<Arc<dyn HostSet>> {
        check_daemon(addr)?;
        Ok(Arc::new(MemoryHostSet {
            network: Arc::clone(&self.network),
            contracts: Mutex::new(Vec::new()),
        }))
    }

    fn file_system(
        &self,
        root: &str,
        hosts: Arc<dyn HostSet>,
    ) -> StorageResult<Arc<dyn FileSystem>> {
        if root.trim().is_empty() {
            return fail("empty file system root");
        }
        let volume = Arc::clone(
            self.network
                .volumes
                .lock()
                .entry(root.to_string())
                .or_default(),
        );
        Ok(Arc::new(MemoryFileSystem {
            volume,
            hosts,
            max_file_size: self.network.config.max_file_size,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct MemoryClient {
    network: Arc<Network>,
}

impl StorageClient for MemoryClient {
    fn chain_height(&self) -> StorageResult<u64> {
        Ok(self.network.height.load(Ordering::SeqCst))
    }

    fn lookup_host(&self, prefix: &str) -> StorageResult<HostKey> {
        self.network.lookup(prefix).map(|(key, _)| key)
    }

    fn form_contract(
        &self,
        host_prefix: &str,
        renter_seed: &[u8; 32],
        funds: &Currency,
        duration: u64,
    ) -> StorageResult<Contract> {
        let (host_key, host) = self.network.lookup(host_prefix)?;
        if funds.is_zero() {
            return fail("contract must be funded");
        }
        if duration == 0 {
            return fail("contract duration must be positive");
        }
        let height = self.network.height.load(Ordering::SeqCst);
        let end_height = height
            .checked_add(duration)
            .ok_or_else(|| CollaboratorError::new("contract end height overflows"))?;
        let nonce = self.network.nonce.fetch_add(1, Ordering::SeqCst);
        let id = blake2b256(&[
            &host_key,
            renter_seed,
            &height.to_le_bytes(),
            &nonce.to_le_bytes(),
        ]);
        host.contracts.lock().insert(id);
        debug!(
            host = %hex::encode(host_key),
            end_height,
            "formed contract"
        );
        Ok(Contract::new(host_key, id, *renter_seed))
    }

    fn new_session(
        &self,
        host_prefix: &str,
        contract: &Contract,
    ) -> StorageResult<Box<dyn Session>> {
        let (host_key, host) = self.network.lookup(host_prefix)?;
        if contract.host_key != host_key {
            return fail("contract was formed with a different host");
        }
        if !host.contracts.lock().contains(&contract.id) {
            return fail("host does not recognize contract");
        }
        Ok(Box::new(MemorySession {
            host,
            sector_size: self.network.config.sector_size,
            segment_size: self.network.config.segment_size,
            closed: false,
        }))
    }
}

struct MemorySession {
    host: Arc<MemoryHost>,
    sector_size: usize,
    segment_size: usize,
    closed: bool,
}

impl MemorySession {
    fn check_open(&self) -> StorageResult<()> {
        if self.closed {
            return fail("session is closed");
        }
        Ok(())
    }
}

impl Session for MemorySession {
    fn append_sector(&mut self, sector: &[u8]) -> StorageResult<SectorRoot> {
        self.check_open()?;
        if sector.len() != self.sector_size {
            return fail(format!(
                "sector must be exactly {} bytes, got {}",
                self.sector_size,
                sector.len()
            ));
        }
        let root = blake2b256(&[sector]);
        self.host
            .sectors
            .lock()
            .insert(root, Arc::new(sector.to_vec()));
        trace!(root = %hex::encode(root), "appended sector");
        Ok(root)
    }

    fn read_sector(&mut self, root: &SectorRoot, offset: u32, dst: &mut [u8]) -> StorageResult<()> {
        self.check_open()?;
        let offset = offset as usize;
        let length = dst.len();
        if length == 0 {
            return fail("read length must be positive");
        }
        if offset % self.segment_size != 0 || length % self.segment_size != 0 {
            return fail(format!(
                "offset and length must be multiples of {} bytes",
                self.segment_size
            ));
        }
        if offset + length > self.sector_size {
            return fail("read extends past end of sector");
        }
        let sector = self
            .host
            .sectors
            .lock()
            .get(root)
            .cloned()
            .ok_or_else(|| CollaboratorError::new("sector not found"))?;
        dst.copy_from_slice(&sector[offset..offset + length]);
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        self.closed = true;
        Ok(())
    }
}

struct MemoryHostSet {
    network: Arc<Network>,
    contracts: Mutex<Vec<Contract>>,
}

impl HostSet for MemoryHostSet {
    fn add_host(&self, contract: &Contract) -> StorageResult<()> {
        let host = self.network.host(&contract.host_key)?;
        if !host.contracts.lock().contains(&contract.id) {
            return fail("host does not recognize contract");
        }
        let mut contracts = self.contracts.lock();
        if !contracts.iter().any(|c| c.host_key == contract.host_key) {
            contracts.push(*contract);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.contracts.lock().len()
    }
}

struct MemoryFileSystem {
    volume: Arc<Volume>,
    hosts: Arc<dyn HostSet>,
    max_file_size: u64,
    closed: Arc<AtomicBool>,
}

impl MemoryFileSystem {
    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return fail("file system is closed");
        }
        Ok(())
    }

    fn handle(&self, contents: SharedFile, writable: bool) -> Box<dyn OpenFile> {
        Box::new(MemoryFile {
            contents,
            position: 0,
            writable,
            max_size: self.max_file_size,
            closed: false,
            fs_closed: Arc::clone(&self.closed),
        })
    }
}

impl FileSystem for MemoryFileSystem {
    fn create(&self, name: &str, min_hosts: usize) -> StorageResult<Box<dyn OpenFile>> {
        self.check_open()?;
        if name.is_empty() {
            return fail("empty file name");
        }
        if min_hosts == 0 {
            return fail("min_hosts must be at least 1");
        }
        let available = self.hosts.len();
        if available < min_hosts {
            return fail(format!(
                "insufficient hosts: need {}, have {}",
                min_hosts, available
            ));
        }
        let contents: SharedFile = Arc::new(Mutex::new(Vec::new()));
        self.volume
            .files
            .lock()
            .insert(name.to_string(), Arc::clone(&contents));
        Ok(self.handle(contents, true))
    }

    fn open(&self, name: &str) -> StorageResult<Box<dyn OpenFile>> {
        self.check_open()?;
        let contents = self
            .volume
            .files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| CollaboratorError::new(format!("no such file: {}", name)))?;
        Ok(self.handle(contents, false))
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryFile {
    contents: SharedFile,
    position: u64,
    writable: bool,
    max_size: u64,
    closed: bool,
    fs_closed: Arc<AtomicBool>,
}

impl MemoryFile {
    fn check_open(&self) -> StorageResult<()> {
        if self.closed {
            return fail("file is closed");
        }
        if self.fs_closed.load(Ordering::SeqCst) {
            return fail("file system is closed");
        }
        Ok(())
    }
}

impl OpenFile for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        self.check_open()?;
        let contents = self.contents.lock();
        let start = (self.position as usize).min(contents.len());
        let n = buf.len().min(contents.len() - start);
        buf[..n].copy_from_slice(&contents[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> StorageResult<usize> {
        self.check_open()?;
        if !self.writable {
            return fail("file not opened for writing");
        }
        let too_large = || {
            CollaboratorError::new(format!(
                "write past maximum file size of {} bytes",
                self.max_size
            ))
        };
        let end = self
            .position
            .checked_add(buf.len() as u64)
            .filter(|end| *end <= self.max_size)
            .ok_or_else(too_large)?;
        let end = usize::try_from(end).map_err(|_| too_large())?;
        let start = end - buf.len();

        let mut contents = self.contents.lock();
        if contents.len() < end {
            let grow = end - contents.len();
            contents.try_reserve(grow).map_err(|e| {
                CollaboratorError::new(format!("cannot grow file to {} bytes: {}", end, e))
            })?;
            contents.resize(end, 0);
        }
        contents[start..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(buf.len())
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> StorageResult<u64> {
        self.check_open()?;
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.position as i64,
            Whence::End => self.contents.lock().len() as i64,
        };
        let target = base
            .checked_add(offset)
            .filter(|p| *p >= 0)
            .ok_or_else(|| CollaboratorError::new("seek to negative position"))?;
        self.position = target as u64;
        Ok(self.position)
    }

    fn close(&mut self) -> StorageResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTOR: usize = 4096;

    fn backend(hosts: usize) -> MemoryBackend {
        MemoryBackend::with_hosts(BindingConfig::small_sectors(SECTOR), hosts)
    }

    fn prefix(key: &HostKey) -> String {
        hex::encode(key)[..8].to_string()
    }

    #[test]
    fn lookup_by_prefix() {
        let backend = backend(3);
        let client = backend.connect("127.0.0.1:9980", "pw").unwrap();
        let keys = backend.host_keys();
        assert_eq!(client.lookup_host(&prefix(&keys[1])).unwrap(), keys[1]);
        assert!(client.lookup_host("").is_err());
        assert!(client.lookup_host("xyz").is_err());
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        let backend = backend(40);
        let client = backend.connect("daemon", "").unwrap();
        // 40 keys cannot all start with distinct hex digits.
        let counts = backend
            .host_keys()
            .iter()
            .map(|k| hex::encode(k)[..1].to_string())
            .fold(HashMap::<String, usize>::new(), |mut m, p| {
                *m.entry(p).or_default() += 1;
                m
            });
        let (shared, _) = counts.iter().find(|(_, n)| **n > 1).unwrap();
        let err = client.lookup_host(shared).unwrap_err();
        assert!(err.message().contains("ambiguous"));
    }

    #[test]
    fn contract_then_session_round_trip() {
        let backend = backend(1);
        let client = backend.connect("daemon", "").unwrap();
        let host = prefix(&backend.host_keys()[0]);
        let contract = client
            .form_contract(&host, &[9u8; 32], &Currency::from(1000u64), 288)
            .unwrap();
        assert_eq!(contract.renter_seed, [9u8; 32]);

        let mut session = client.new_session(&host, &contract).unwrap();
        let mut sector = vec![0u8; SECTOR];
        sector[64..128].fill(b'B');
        let root = session.append_sector(&sector).unwrap();

        let mut out = [0u8; 64];
        session.read_sector(&root, 64, &mut out).unwrap();
        assert_eq!(out, [b'B'; 64]);
        session.close().unwrap();
        assert!(session.read_sector(&root, 0, &mut out).is_err());
    }

    #[test]
    fn session_enforces_sector_rules() {
        let backend = backend(1);
        let client = backend.connect("daemon", "").unwrap();
        let host = prefix(&backend.host_keys()[0]);
        let contract = client
            .form_contract(&host, &[1u8; 32], &Currency::from(1u64), 1)
            .unwrap();
        let mut session = client.new_session(&host, &contract).unwrap();

        assert!(session.append_sector(&[0u8; 10]).is_err());
        let root = session.append_sector(&vec![1u8; SECTOR]).unwrap();
        let mut misaligned = [0u8; 10];
        assert!(session.read_sector(&root, 0, &mut misaligned).is_err());
        let mut past_end = [0u8; 128];
        assert!(session
            .read_sector(&root, (SECTOR - 64) as u32, &mut past_end)
            .is_err());
        let mut ok = [0u8; 64];
        assert!(session.read_sector(&[0u8; 32], 0, &mut ok).is_err());
    }

    #[test]
    fn unfunded_or_foreign_contracts_fail() {
        let backend = backend(2);
        let client = backend.connect("daemon", "").unwrap();
        let keys = backend.host_keys();
        let a = prefix(&keys[0]);
        let b = prefix(&keys[1]);
        assert!(client
            .form_contract(&a, &[0u8; 32], &Currency::zero(), 10)
            .is_err());
        let contract = client
            .form_contract(&a, &[0u8; 32], &Currency::from(5u64), 10)
            .unwrap();
        let err = client.new_session(&b, &contract).err().unwrap();
        assert!(err.message().contains("different host"));
    }

    #[test]
    fn file_system_create_write_open_read() {
        let backend = backend(2);
        let client = backend.connect("daemon", "").unwrap();
        let hosts = backend.host_set("daemon", "").unwrap();
        for key in backend.host_keys() {
            let c = client
                .form_contract(&prefix(&key), &[4u8; 32], &Currency::from(10u64), 10)
                .unwrap();
            hosts.add_host(&c).unwrap();
        }
        assert_eq!(hosts.len(), 2);

        let fs = backend.file_system("meta", Arc::clone(&hosts)).unwrap();
        assert!(fs.create("foo.txt", 3).is_err());

        fs.upload("foo.txt", b"Hello from Rust!", 2).unwrap();
        assert_eq!(fs.download("foo.txt").unwrap(), b"Hello from Rust!");

        let mut f = fs.open("foo.txt").unwrap();
        assert!(f.write(b"nope").is_err());
        assert_eq!(f.seek(6, Whence::Start).unwrap(), 6);
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"from");
        assert_eq!(f.seek(-1, Whence::End).unwrap(), 15);
        assert!(f.seek(-100, Whence::Current).is_err());

        // Same root sees the same files.
        let again = backend.file_system("meta", hosts).unwrap();
        assert!(again.open("foo.txt").is_ok());
    }

    #[test]
    fn closed_file_system_rejects_io() {
        let backend = backend(1);
        let hosts = backend.host_set("daemon", "").unwrap();
        let client = backend.connect("daemon", "").unwrap();
        let c = client
            .form_contract(&prefix(&backend.host_keys()[0]), &[0u8; 32], &Currency::from(1u64), 1)
            .unwrap();
        hosts.add_host(&c).unwrap();
        let fs = backend.file_system("root", hosts).unwrap();
        let mut f = fs.create("a", 1).unwrap();
        fs.close().unwrap();
        assert!(f.write(b"x").is_err());
        assert!(fs.open("a").is_err());
    }

    #[test]
    fn write_far_past_end_is_refused() {
        let mut config = BindingConfig::small_sectors(SECTOR);
        config.max_file_size = 1024;
        let backend = MemoryBackend::with_hosts(config, 1);
        let client = backend.connect("daemon", "").unwrap();
        let hosts = backend.host_set("daemon", "").unwrap();
        let c = client
            .form_contract(&prefix(&backend.host_keys()[0]), &[0u8; 32], &Currency::from(1u64), 1)
            .unwrap();
        hosts.add_host(&c).unwrap();
        let fs = backend.file_system("root", hosts).unwrap();
        let mut f = fs.create("sparse", 1).unwrap();

        assert_eq!(f.seek(1 << 46, Whence::Start).unwrap(), 1 << 46);
        let err = f.write(b"x").unwrap_err();
        assert_eq!(err.message(), "write past maximum file size of 1024 bytes");
        assert_eq!(f.seek(i64::MAX, Whence::Start).unwrap(), i64::MAX as u64);
        assert!(f.write(b"x").is_err());

        // Up to the limit is fine, including a zero-filled gap.
        assert_eq!(f.seek(1020, Whence::Start).unwrap(), 1020);
        assert_eq!(f.write(b"tail").unwrap(), 4);
        assert!(f.write(b"!").is_err());
        f.close().unwrap();
        let data = fs.download("sparse").unwrap();
        assert_eq!(data.len(), 1024);
        assert!(data[..1020].iter().all(|b| *b == 0));
    }

    #[test]
    fn slow_hosts_time_out() {
        let mut config = BindingConfig::small_sectors(SECTOR);
        config.host_scan_timeout = Duration::from_secs(2);
        let backend = MemoryBackend::with_hosts(config, 1);
        let client = backend.connect("daemon", "").unwrap();
        let key = backend.host_keys()[0];

        assert!(backend.set_host_latency(&key, Duration::from_secs(5)));
        let err = client.lookup_host(&prefix(&key)).unwrap_err();
        assert!(err.message().contains("did not respond within 2s"));
        assert!(client
            .form_contract(&prefix(&key), &[0u8; 32], &Currency::from(1u64), 1)
            .is_err());

        assert!(backend.set_host_latency(&key, Duration::from_secs(2)));
        assert_eq!(client.lookup_host(&prefix(&key)).unwrap(), key);
        assert!(!backend.set_host_latency(&[0u8; 32], Duration::ZERO));
    }

    #[test]
    fn chain_height_follows_mined_blocks() {
        let backend = backend(1);
        let client = backend.connect("daemon", "").unwrap();
        assert_eq!(client.chain_height().unwrap(), 0);
        backend.mine(144);
        assert_eq!(client.chain_height().unwrap(), 144);

        // Contracts formed at different heights get different ids.
        let host = prefix(&backend.host_keys()[0]);
        let a = client
            .form_contract(&host, &[1u8; 32], &Currency::from(1u64), 10)
            .unwrap();
        backend.mine(1);
        let b = client
            .form_contract(&host, &[1u8; 32], &Currency::from(1u64), 10)
            .unwrap();
        assert_ne!(a.id, b.id);
        assert!(client
            .form_contract(&host, &[1u8; 32], &Currency::from(1u64), u64::MAX)
            .is_err());
    }

    #[test]
    fn open_missing_file() {
        let backend = backend(0);
        let hosts = backend.host_set("daemon", "").unwrap();
        let fs = backend.file_system("root", hosts).unwrap();
        let err = fs.open("missing").err().unwrap();
        assert_eq!(err.message(), "no such file: missing");
    }
}
