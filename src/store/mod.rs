//! # Tracker State Store
//!
//! Persists the [`SequenceTracker`](crate::tracker::SequenceTracker) state
//! between runs so a restart does not re-forward readings already sent.
//!
//! The on-disk format is a JSON object keyed by source node id:
//!
//! ```json
//! {"5":{"tx_count":1043,"count":212}}
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::tracker::TrackerState;

/// Persistence for the tracker state
pub trait StateStore {
    /// Load the last saved state; an empty map if nothing was saved yet
    fn load(&self) -> Result<TrackerState>;

    /// Overwrite the saved state with `state`
    fn save(&self, state: &TrackerState) -> Result<()>;
}

/// State stored as a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path the state is written to before being renamed into place
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<TrackerState> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No state file at {}, starting fresh", self.path.display());
                return Ok(TrackerState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: TrackerState = serde_json::from_str(&contents)?;
        info!("Loaded state for {} node(s) from {}", state.len(), self.path.display());
        Ok(state)
    }

    fn save(&self, state: &TrackerState) -> Result<()> {
        let json = serde_json::to_vec(state)?;
        let staging = self.staging_path();

        // Rename is atomic on the same filesystem, readers never see a torn file
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;

        debug!("Saved state for {} node(s)", state.len());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeterLinkError;
    use crate::tracker::NodeState;
    use tempfile::TempDir;

    fn sample_state() -> TrackerState {
        let mut state = TrackerState::new();
        state.insert(
            5,
            NodeState {
                last_tx_count: Some(1043),
                last_count: Some(212),
            },
        );
        state
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("last_packets"));

        let state = store.load().unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("last_packets"));

        store.save(&sample_state()).unwrap();
        assert_eq!(store.load().unwrap(), sample_state());
    }

    #[test]
    fn test_save_overwrites_whole_state() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("last_packets"));

        store.save(&sample_state()).unwrap();
        store.save(&TrackerState::new()).unwrap();

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_leaves_no_staging_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("last_packets"));

        store.save(&sample_state()).unwrap();

        assert!(store.path().exists());
        assert!(!dir.path().join("last_packets.tmp").exists());
    }

    #[test]
    fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_packets");
        let store = JsonFileStore::new(&path);

        store.save(&sample_state()).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, r#"{"5":{"tx_count":1043,"count":212}}"#);
    }

    #[test]
    fn test_load_existing_file_with_partial_node() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_packets");
        fs::write(&path, r#"{"5":{"tx_count":17}}"#).unwrap();

        let state = JsonFileStore::new(&path).load().unwrap();
        let node = state.get(&5).unwrap();
        assert_eq!(node.last_tx_count, Some(17));
        assert_eq!(node.last_count, None);
    }

    #[test]
    fn test_load_corrupt_file_returns_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_packets");
        fs::write(&path, "not json").unwrap();

        match JsonFileStore::new(&path).load() {
            Err(MeterLinkError::State(_)) => {}
            other => panic!("Expected State error, got: {:?}", other),
        }
    }

    #[test]
    fn test_save_into_missing_directory_returns_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("missing").join("last_packets"));

        assert!(matches!(store.save(&sample_state()), Err(MeterLinkError::Io(_))));
    }
}
