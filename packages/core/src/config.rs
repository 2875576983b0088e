//! Binding configuration.

use std::time::Duration;

use tracing::warn;

/// Tunables for the binding layer and the in-memory storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfig {
    /// Maximum number of live handles per registry.
    pub max_handles: usize,

    /// Size of one sector in bytes. Session uploads must be exactly this long.
    pub sector_size: usize,

    /// Session reads must be aligned to this many bytes.
    pub segment_size: usize,

    /// How long the storage layer waits for a host to answer a scan before
    /// giving up on it.
    pub host_scan_timeout: Duration,

    /// Largest size a file may grow to through writes.
    pub max_file_size: u64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            max_handles: 65_536,
            sector_size: 1 << 22,
            segment_size: 64,
            host_scan_timeout: Duration::from_secs(10),
            max_file_size: 1 << 30,
        }
    }
}

impl BindingConfig {
    /// Defaults overridden by `RENTERBIND_MAX_HANDLES`,
    /// `RENTERBIND_SECTOR_SIZE`, `RENTERBIND_SCAN_TIMEOUT_SECS` and
    /// `RENTERBIND_MAX_FILE_SIZE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let read = |name: &str| -> Option<u64> {
            let raw = lookup(name)?;
            match raw.trim().parse::<u64>() {
                Ok(v) if v > 0 => Some(v),
                _ => {
                    warn!(variable = name, value = %raw, "ignoring invalid configuration value");
                    None
                }
            }
        };

        if let Some(v) = read("RENTERBIND_MAX_HANDLES") {
            config.max_handles = v as usize;
        }
        if let Some(v) = read("RENTERBIND_SECTOR_SIZE") {
            if v as usize % config.segment_size == 0 {
                config.sector_size = v as usize;
            } else {
                warn!(value = v, "sector size must be a multiple of the segment size");
            }
        }
        if let Some(v) = read("RENTERBIND_SCAN_TIMEOUT_SECS") {
            config.host_scan_timeout = Duration::from_secs(v);
        }
        if let Some(v) = read("RENTERBIND_MAX_FILE_SIZE") {
            config.max_file_size = v;
        }
        config
    }

    /// Config with a small sector, for tests and demos.
    pub fn small_sectors(sector_size: usize) -> Self {
        Self {
            sector_size,
            ..Self::default()
        }
    }
}
