//! blockcheck - IP blocklist membership service.
//!
//! This crate answers "is this IP address on the blocklist?" for batches
//! of addresses, backed by a dataset that is periodically re-downloaded
//! and hot-swapped without interrupting queries.
//!
//! # Features
//!
//! - **Longest-prefix matching**: IPv4 and IPv6 networks in a bit trie,
//!   the most specific network wins
//! - **Tolerant loading**: malformed records and tokens are skipped and
//!   counted, gzip-compressed dumps are accepted
//! - **Hot refresh**: new indexes are published with an atomic pointer
//!   swap; readers never block
//! - **Safe persistence**: downloads land in a staging file and only
//!   replace the last-known-good copy after a successful build
//!
//! # Quick Start
//!
//! ```
//! use blockcheck::{DatasetLoader, PublishedIndex, QueryService};
//! use std::sync::Arc;
//!
//! let (index, _stats) = DatasetLoader::load_bytes(b"1.2.3.0/24;note\n").unwrap();
//! let service = QueryService::new(Arc::new(PublishedIndex::new(index)));
//!
//! let result = service.check_batch(&["1.2.3.4", "8.8.8.8"]).unwrap();
//! assert_eq!(result.get("1.2.3.4"), Some(true));
//! assert_eq!(result.get("8.8.8.8"), Some(false));
//! ```
//!
//! # Running the service
//!
//! ```ignore
//! use blockcheck::{Config, RefreshScheduler};
//! use std::sync::Arc;
//!
//! let config = Config::new("127.0.0.1:8080".parse()?, "/var/lib/blockcheck");
//! let scheduler = Arc::new(RefreshScheduler::from_config(config)?);
//!
//! // Blocks until the first dataset is available.
//! scheduler.bootstrap()?;
//!
//! // Periodic refresh on a background thread.
//! let handle = Arc::clone(&scheduler).spawn()?;
//! ```

mod error;
mod flag;
mod metadata;

pub mod config;
pub mod index;
pub mod loader;
pub mod publish;
pub mod query;
pub mod scheduler;
pub mod server;
pub mod source;

// Re-export core types
pub use error::{Error, Result};
pub use flag::Flag;
pub use index::PrefixIndex;

pub use config::Config;
pub use loader::{DatasetLoader, LoadStats};
pub use metadata::DatasetState;
pub use publish::{PublishedIndex, Snapshot};
pub use query::{BatchResult, QueryService};
pub use scheduler::{RefreshHandle, RefreshOutcome, RefreshScheduler, SchedulerState};
pub use source::{DatasetSource, FileSource, HttpSource};
