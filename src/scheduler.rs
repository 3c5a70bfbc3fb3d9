//! Dataset retrieval and index rebuild lifecycle.
//!
//! The scheduler moves through `Bootstrapping → Serving ⇄ Refreshing`:
//!
//! - **Bootstrapping**: the dataset is fetched until it succeeds, waiting
//!   a fixed interval between failures. Nothing is served before that.
//! - **Serving**: the published index answers queries.
//! - **Refreshing**: a new dataset is downloaded into a staging file next
//!   to the last-known-good copy, loaded, published, and only then
//!   promoted over the old copy. Any failure leaves the previous index
//!   and the previous copy in place.
//!
//! Refreshes never overlap: the cycle runs under a lock that is only
//! ever `try_lock`ed, so a second caller skips instead of queueing.

use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::error::Result;
use crate::loader::{DatasetLoader, LoadStats};
use crate::metadata::DatasetState;
use crate::publish::PublishedIndex;
use crate::source::{source_from_location, DatasetSource};
use crate::PrefixIndex;

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Bootstrapping,
    Serving,
    Refreshing,
}

/// Result of one retrieval-and-rebuild cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A dataset with new content was published.
    Updated { generation: u64, entries: usize },
    /// The dataset was identical to the last one; it was still rebuilt and
    /// published.
    Unchanged { generation: u64, entries: usize },
    /// Another cycle was already running.
    Skipped,
}

/// Writer that hashes everything passing through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A downloaded and parsed dataset that has not been published yet.
struct StagedDataset {
    file: NamedTempFile,
    index: PrefixIndex,
    stats: LoadStats,
    sha256: String,
}

/// Owns the dataset lifecycle and the published index.
pub struct RefreshScheduler {
    config: Config,
    source: Box<dyn DatasetSource>,
    published: Arc<PublishedIndex>,
    state: RwLock<SchedulerState>,
    dataset: RwLock<DatasetState>,
    cycle_lock: Mutex<()>,
}

impl RefreshScheduler {
    /// Create a scheduler reading from `source`.
    pub fn new(config: Config, source: Box<dyn DatasetSource>) -> Self {
        Self {
            config,
            source,
            published: Arc::new(PublishedIndex::default()),
            state: RwLock::new(SchedulerState::Bootstrapping),
            dataset: RwLock::new(DatasetState::default()),
            cycle_lock: Mutex::new(()),
        }
    }

    /// Create a scheduler for the source named in `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let source = source_from_location(&config.source, config.download_timeout)?;
        Ok(Self::new(config, source))
    }

    /// The index readers should consult.
    pub fn published(&self) -> Arc<PublishedIndex> {
        Arc::clone(&self.published)
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    /// Whether a dataset has ever been published.
    pub fn is_ready(&self) -> bool {
        self.state() != SchedulerState::Bootstrapping
    }

    /// State of the dataset currently being served.
    pub fn dataset_state(&self) -> DatasetState {
        self.dataset.read().clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Block until a first dataset is published.
    ///
    /// Source and parse failures are logged and retried after
    /// `retry_interval`, without limit. Only configuration problems are
    /// returned.
    pub fn bootstrap(&self) -> Result<RefreshOutcome> {
        let _guard = self.cycle_lock.lock();

        if self.config.warm_start {
            match self.load_last_good() {
                Ok(outcome) => {
                    self.set_state(SchedulerState::Serving);
                    return Ok(outcome);
                }
                Err(e) => log::warn!("Warm start unavailable, downloading instead: {}", e),
            }
        }

        let mut attempt = 1u64;
        loop {
            match self.cycle() {
                Ok(outcome) => {
                    self.set_state(SchedulerState::Serving);
                    log::info!("Bootstrap complete after {} attempt(s)", attempt);
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() => {
                    log::warn!(
                        "Bootstrap attempt {} failed: {}, retry after {:?}",
                        attempt,
                        e,
                        self.config.retry_interval
                    );
                    thread::sleep(self.config.retry_interval);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run one refresh cycle unless one is already running.
    ///
    /// On failure the previously published index stays authoritative and
    /// the error is returned for logging.
    pub fn refresh_once(&self) -> Result<RefreshOutcome> {
        let Some(_guard) = self.cycle_lock.try_lock() else {
            log::debug!("Refresh already in progress, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        let previous = self.state();
        self.set_state(SchedulerState::Refreshing);
        let result = self.cycle();
        self.set_state(match (previous, &result) {
            (SchedulerState::Bootstrapping, Err(_)) => SchedulerState::Bootstrapping,
            _ => SchedulerState::Serving,
        });

        match &result {
            Ok(RefreshOutcome::Updated {
                generation,
                entries,
            }) => log::info!("Dataset updated: {} networks, generation {}", entries, generation),
            Ok(RefreshOutcome::Unchanged {
                generation,
                entries,
            }) => log::info!(
                "Dataset unchanged: {} networks, generation {}",
                entries,
                generation
            ),
            Ok(RefreshOutcome::Skipped) => {}
            Err(e) => log::warn!(
                "Refresh failed, keeping generation {}: {}",
                self.published.generation(),
                e
            ),
        }
        result
    }

    /// Run periodic refreshes on a dedicated thread.
    pub fn spawn(self: Arc<Self>) -> Result<RefreshHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = self.config.refresh_interval;
        let thread = thread::Builder::new()
            .name("blockcheck-refresh".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        log::info!("Updating dataset from {}", self.source.describe());
                        let _ = self.refresh_once();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        log::debug!("Refresh thread stopping");
                        break;
                    }
                }
            })?;
        Ok(RefreshHandle {
            stop: stop_tx,
            thread,
        })
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.write() = state;
    }

    /// Publish the persisted last-known-good copy.
    fn load_last_good(&self) -> Result<RefreshOutcome> {
        let path = self.config.current_path();
        let (index, stats) = DatasetLoader::load_file(&path)?;
        let generation = self.published.publish(index);

        let mut state = DatasetState::load(self.config.metadata_path()).unwrap_or_default();
        state.entries = stats.entries;
        *self.dataset.write() = state;

        log::info!("Serving last-known-good dataset from {:?}", path);
        Ok(RefreshOutcome::Updated {
            generation,
            entries: stats.entries,
        })
    }

    /// Download into a staging file and build an index from it.
    fn stage(&self) -> Result<StagedDataset> {
        fs::create_dir_all(self.config.data_dir())?;
        let file = tempfile::Builder::new()
            .prefix(self.config.staging_prefix())
            .tempfile_in(self.config.data_dir())?;

        log::info!(
            "Downloading dataset from {} to {:?}",
            self.source.describe(),
            file.path()
        );
        let mut writer = HashingWriter {
            inner: file.as_file(),
            hasher: Sha256::new(),
        };
        let bytes = self.source.fetch_into(&mut writer)?;
        writer.flush()?;
        let sha256 = format!("{:x}", writer.hasher.finalize());
        file.as_file().sync_all()?;
        log::info!("Dataset downloaded: {} bytes", bytes);

        let (index, stats) = DatasetLoader::load(file.reopen()?)?;
        Ok(StagedDataset {
            file,
            index,
            stats,
            sha256,
        })
    }

    /// Stage, publish, then promote. Must run under `cycle_lock`.
    fn cycle(&self) -> Result<RefreshOutcome> {
        let staged = self.stage()?;
        let entries = staged.stats.entries;
        let unchanged = self.dataset.read().same_content(&staged.sha256);

        let generation = self.published.publish(staged.index);

        let current = self.config.current_path();
        match staged.file.persist(&current) {
            Ok(_) => {
                let state = DatasetState::now(self.source.describe(), staged.sha256, entries);
                if let Err(e) = state.save(self.config.metadata_path()) {
                    log::warn!("Failed to save dataset state: {}", e);
                }
                *self.dataset.write() = state;
            }
            Err(e) => {
                // The new index is live; the previous copy on disk stays
                // as the fallback.
                log::error!("Failed to promote staged dataset to {:?}: {}", current, e.error);
                *self.dataset.write() =
                    DatasetState::now(self.source.describe(), staged.sha256, entries);
            }
        }

        Ok(if unchanged {
            RefreshOutcome::Unchanged {
                generation,
                entries,
            }
        } else {
            RefreshOutcome::Updated {
                generation,
                entries,
            }
        })
    }
}

/// Handle to the periodic refresh thread.
pub struct RefreshHandle {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop the refresh thread, waiting for an in-flight cycle to finish.
    pub fn shutdown(self) {
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            log::error!("Refresh thread panicked");
        }
    }
}
