//! Read-side batch membership checks.

use ahash::AHashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::publish::{PublishedIndex, Snapshot};

/// Membership result for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Each distinct input address mapped to whether it is listed.
    pub results: AHashMap<String, bool>,
    /// Inputs that were not valid addresses (reported as `false`).
    pub malformed: usize,
    /// Generation of the index the batch was answered from.
    pub generation: u64,
}

impl BatchResult {
    pub fn get(&self, address: &str) -> Option<bool> {
        self.results.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Answers membership queries against the currently published index.
#[derive(Clone)]
pub struct QueryService {
    published: Arc<PublishedIndex>,
}

impl QueryService {
    pub fn new(published: Arc<PublishedIndex>) -> Self {
        Self { published }
    }

    /// Check every address in `addresses`.
    ///
    /// The whole batch is answered from a single snapshot of the index.
    /// Addresses that fail to parse map to `false` and are counted in
    /// [`BatchResult::malformed`] rather than failing the batch.
    pub fn check_batch<S: AsRef<str>>(&self, addresses: &[S]) -> Result<BatchResult> {
        if addresses.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let index = self.published.snapshot();
        let mut result = BatchResult {
            results: AHashMap::with_capacity(addresses.len()),
            malformed: 0,
            generation: index.generation(),
        };

        for address in addresses {
            let address = address.as_ref();
            let listed = match index.lookup_str(address) {
                Ok(flag) => flag.is_listed(),
                Err(e) => {
                    log::warn!("Treating {:?} as unlisted: {}", address, e);
                    result.malformed += 1;
                    false
                }
            };
            result.results.insert(address.to_string(), listed);
        }

        Ok(result)
    }

    /// The currently published index and its generation.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.snapshot()
    }

    /// Generation of the currently published index.
    pub fn generation(&self) -> u64 {
        self.published.generation()
    }

    /// Number of networks in the currently published index.
    pub fn entries(&self) -> usize {
        self.published.snapshot().network_count()
    }
}
