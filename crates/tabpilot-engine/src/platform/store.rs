//! Persistence of the controlled tab id across restarts.

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::TabId;

/// Session-scoped key/value persistence for the controlled tab.
pub trait StateStore: Send + Sync {
    fn load_tab_id(&self) -> Option<TabId>;
    fn save_tab_id(&self, tab_id: &TabId) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tab_id: Option<TabId>,
}

/// JSON file store, by default at `~/.tabpilot/state.json`.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<PersistedState> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read state file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Ignoring corrupt state file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn write(&self, state: &PersistedState) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(state).map_err(io::Error::other)?;
        std::fs::write(&self.path, content)
    }
}

impl StateStore for FileStateStore {
    fn load_tab_id(&self) -> Option<TabId> {
        self.read().and_then(|state| state.tab_id)
    }

    fn save_tab_id(&self, tab_id: &TabId) -> io::Result<()> {
        debug!("Persisting controlled tab {}", tab_id);
        self.write(&PersistedState {
            tab_id: Some(tab_id.clone()),
        })
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-process store for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryStateStore {
    tab_id: Mutex<Option<TabId>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load_tab_id(&self) -> Option<TabId> {
        self.tab_id.lock().clone()
    }

    fn save_tab_id(&self, tab_id: &TabId) -> io::Result<()> {
        *self.tab_id.lock() = Some(tab_id.clone());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.tab_id.lock() = None;
        Ok(())
    }
}
