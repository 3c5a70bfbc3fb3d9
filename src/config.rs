//! Service configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default dataset location.
pub const DEFAULT_SOURCE: &str = "https://github.com/zapret-info/z-i/raw/master/dump.csv";

/// Default per-attempt download timeout.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay between failed bootstrap attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Default interval between periodic refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

const CURRENT_FILE: &str = "dump.current";
const METADATA_FILE: &str = "dump.meta";
const STAGING_PREFIX: &str = "dump.fresh";

/// Runtime configuration for the scheduler and the HTTP boundary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub listen: SocketAddr,
    /// Directory holding the last-known-good dump and its state.
    pub data_dir: PathBuf,
    /// URL or path of the dataset.
    pub source: String,
    pub download_timeout: Duration,
    pub retry_interval: Duration,
    pub refresh_interval: Duration,
    /// Serve the persisted last-good dump at startup instead of waiting
    /// for the first download.
    pub warm_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data_dir: PathBuf::from("."),
            source: DEFAULT_SOURCE.to_string(),
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            warm_start: false,
        }
    }
}

impl Config {
    /// Create a configuration with defaults for everything but the
    /// listen address and data directory.
    pub fn new(listen: SocketAddr, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            listen,
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(Error::Config("dataset source must not be empty".to_string()));
        }
        if self.download_timeout.is_zero() {
            return Err(Error::Config("download timeout must be positive".to_string()));
        }
        if self.retry_interval.is_zero() {
            return Err(Error::Config("retry interval must be positive".to_string()));
        }
        if self.refresh_interval.is_zero() {
            return Err(Error::Config("refresh interval must be positive".to_string()));
        }
        Ok(())
    }

    /// Path of the last-known-good dump.
    pub fn current_path(&self) -> PathBuf {
        self.data_dir.join(CURRENT_FILE)
    }

    /// Path of the persisted dataset state.
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }

    /// File name prefix for staging downloads.
    pub fn staging_prefix(&self) -> &'static str {
        STAGING_PREFIX
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
