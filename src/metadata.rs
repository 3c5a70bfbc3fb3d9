//! Persisted state of the last successfully loaded dataset.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};

/// State of the last-known-good dataset.
///
/// Written only after a refresh has been published and promoted; a
/// failed refresh leaves it untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DatasetState {
    #[serde(with = "system_time_serde")]
    pub last_updated: Option<SystemTime>,
    /// Where the dataset was retrieved from.
    pub location: Option<String>,
    /// Hex SHA-256 of the raw dataset bytes.
    pub sha256: Option<String>,
    /// Listed networks loaded from it.
    pub entries: usize,
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        time.map(|t| t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs())
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}

impl DatasetState {
    /// State for a dataset loaded just now.
    pub fn now(location: impl Into<String>, sha256: impl Into<String>, entries: usize) -> Self {
        Self {
            last_updated: Some(SystemTime::now()),
            location: Some(location.into()),
            sha256: Some(sha256.into()),
            entries,
        }
    }

    /// Load state from a file.
    ///
    /// Returns the default state if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save state to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Time elapsed since the last successful refresh, if any.
    pub fn age(&self) -> Option<Duration> {
        self.last_updated
            .map(|last| SystemTime::now().duration_since(last).unwrap_or_default())
    }

    /// Whether `sha256` matches the recorded checksum.
    pub fn same_content(&self, sha256: &str) -> bool {
        self.sha256.as_deref() == Some(sha256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_state_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.meta");
        let state = DatasetState::now("https://example.com/dump.csv", "abc123", 42);
        state.save(&path).unwrap();

        let loaded = DatasetState::load(&path).unwrap();
        assert!(loaded.last_updated.is_some());
        assert_eq!(loaded.location.as_deref(), Some("https://example.com/dump.csv"));
        assert_eq!(loaded.sha256.as_deref(), Some("abc123"));
        assert_eq!(loaded.entries, 42);
    }

    #[test]
    fn test_state_missing_file() {
        let loaded = DatasetState::load("/nonexistent/dump.meta").unwrap();
        assert_eq!(loaded, DatasetState::default());
        assert!(loaded.age().is_none());
    }

    #[test]
    fn test_state_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.meta");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(DatasetState::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_same_content() {
        let state = DatasetState::now("x", "deadbeef", 1);
        assert!(state.same_content("deadbeef"));
        assert!(!state.same_content("cafebabe"));
        assert!(!DatasetState::default().same_content("deadbeef"));
    }

    #[test]
    fn test_age() {
        let state = DatasetState {
            last_updated: Some(SystemTime::now() - Duration::from_secs(120)),
            ..Default::default()
        };
        assert!(state.age().unwrap() >= Duration::from_secs(120));
    }
}
