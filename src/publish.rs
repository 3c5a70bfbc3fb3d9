//! The currently published prefix index.
//!
//! Publication is a single atomic pointer swap. Readers take a snapshot
//! (`Arc<Snapshot>`) and keep using it for the duration of one batch, so a
//! concurrent publish never exposes a partially built index. Old indexes
//! are dropped when the last snapshot referencing them goes away.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;

use crate::PrefixIndex;

/// A published index together with the generation it was published as.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    index: PrefixIndex,
}

impl Snapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn index(&self) -> &PrefixIndex {
        &self.index
    }
}

impl Deref for Snapshot {
    type Target = PrefixIndex;

    fn deref(&self) -> &PrefixIndex {
        &self.index
    }
}

/// Atomically replaceable reference to the current [`PrefixIndex`].
pub struct PublishedIndex {
    inner: ArcSwap<Snapshot>,
    /// Serializes publishers so generations are stored in order.
    publish_lock: Mutex<()>,
}

impl PublishedIndex {
    /// Publish `index` as generation 0.
    pub fn new(index: PrefixIndex) -> Self {
        Self {
            inner: ArcSwap::from_pointee(Snapshot {
                generation: 0,
                index,
            }),
            publish_lock: Mutex::new(()),
        }
    }

    /// Take a snapshot of the current index.
    ///
    /// The snapshot stays valid and unchanged even if a newer index is
    /// published while it is in use, and its generation always names the
    /// index it holds.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }

    /// Replace the current index and return the new generation.
    ///
    /// In-flight readers finish with the index they already hold.
    pub fn publish(&self, index: PrefixIndex) -> u64 {
        let _guard = self.publish_lock.lock();
        let generation = self.inner.load().generation + 1;
        self.inner.store(Arc::new(Snapshot { generation, index }));
        log::debug!("Published index generation {}", generation);
        generation
    }

    /// Number of publishes since construction.
    pub fn generation(&self) -> u64 {
        self.inner.load().generation
    }
}

impl Default for PublishedIndex {
    fn default() -> Self {
        Self::new(PrefixIndex::new())
    }
}
