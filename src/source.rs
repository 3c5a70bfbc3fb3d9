//! Dataset sources: where the raw dump is retrieved from.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// A place the raw dataset can be fetched from.
pub trait DatasetSource: Send + Sync {
    /// Copy the full dataset into `dest`, returning the number of bytes
    /// written. Any failure means the destination content must be discarded.
    fn fetch_into(&self, dest: &mut dyn Write) -> Result<u64>;

    /// Human readable location, used in logs and persisted state.
    fn describe(&self) -> String;
}

/// Fetches the dataset with an HTTP GET.
pub struct HttpSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    /// Create a source for `url`; each fetch is bounded by `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("blockcheck/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// The configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DatasetSource for HttpSource {
    fn fetch_into(&self, dest: &mut dyn Write) -> Result<u64> {
        let mut response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| Error::SourceRead(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SourceRead(format!("{} returned {}", self.url, status)));
        }

        let written = response.copy_to(dest).map_err(|e| {
            Error::SourceRead(format!("reading body from {} failed: {}", self.url, e))
        })?;
        Ok(written)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads the dataset from a local file.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSource for FileSource {
    fn fetch_into(&self, dest: &mut dyn Write) -> Result<u64> {
        let mut file = File::open(&self.path)
            .map_err(|e| Error::SourceRead(format!("{}: {}", self.path.display(), e)))?;
        let written = io::copy(&mut file, dest)
            .map_err(|e| Error::SourceRead(format!("{}: {}", self.path.display(), e)))?;
        Ok(written)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pick a source for `location`: HTTP(S) URLs are downloaded, anything
/// else (optionally prefixed with `file://`) is read from disk.
pub fn source_from_location(location: &str, timeout: Duration) -> Result<Box<dyn DatasetSource>> {
    let location = location.trim();
    if location.is_empty() {
        return Err(Error::Config("empty dataset source".to_string()));
    }
    if location.starts_with("http://") || location.starts_with("https://") {
        return Ok(Box::new(HttpSource::new(location, timeout)?));
    }
    let path = location.strip_prefix("file://").unwrap_or(location);
    Ok(Box::new(FileSource::new(path)))
}
