//! Browser platform seam.
//!
//! Everything the engine needs from a real browser goes through
//! [`BrowserPlatform`]. [`CdpPlatform`] drives Chrome over CDP; tests swap in
//! an in-memory fake.

mod cdp;
mod launcher;
mod store;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cdp::CdpError;

pub use self::cdp::CdpPlatform;
pub use self::launcher::ChromeLauncher;
pub use self::store::{FileStateStore, MemoryStateStore, StateStore};

/// Opaque platform handle for a tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque platform handle for a window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Live view of a tab as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub tab_id: TabId,
    pub window_id: WindowId,
    pub url: String,
}

/// Whether a page load finished before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed,
    TimedOut,
}

/// Direction of a history move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    Back,
    Forward,
}

impl HistoryDirection {
    pub fn offset(self) -> i64 {
        match self {
            HistoryDirection::Back => -1,
            HistoryDirection::Forward => 1,
        }
    }
}

impl fmt::Display for HistoryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryDirection::Back => f.write_str("back"),
            HistoryDirection::Forward => f.write_str("forward"),
        }
    }
}

/// Platform errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Tab not found: {0}")]
    TabNotFound(String),

    /// Capture quota exhausted. Retrying later may succeed.
    #[error("Capture rate limit exceeded")]
    RateLimited,

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Browser not connected")]
    NotConnected,

    #[error("Chrome not found. Please install Google Chrome.")]
    ChromeNotFound,

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Browser request failed: {0}")]
    Request(String),
}

impl From<CdpError> for PlatformError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::ConnectionFailed(msg) => PlatformError::ConnectionFailed(msg),
            CdpError::ChromeNotAvailable(msg) => PlatformError::ConnectionFailed(msg),
            CdpError::NavigationFailed(msg) => PlatformError::NavigationFailed(msg),
            CdpError::JavaScript(msg) => PlatformError::Script(msg),
            CdpError::SessionClosed => PlatformError::NotConnected,
            _ => PlatformError::Request(e.to_string()),
        }
    }
}

/// Browser capabilities the engine relies on.
///
/// Implementations must be safe to share across tasks; the engine holds one
/// behind an `Arc` for its whole lifetime.
#[async_trait]
pub trait BrowserPlatform: Send + Sync {
    /// Live state of a tab. Fails with `TabNotFound` once it is gone.
    async fn get_tab(&self, tab_id: &TabId) -> Result<TabInfo, PlatformError>;

    /// Open a new window showing `url` and return its single tab.
    async fn create_window(&self, url: &str) -> Result<TabInfo, PlatformError>;

    /// Raise and focus a window.
    async fn focus_window(&self, window_id: &WindowId) -> Result<(), PlatformError>;

    /// Make a tab the active tab of its window.
    async fn activate_tab(&self, tab_id: &TabId) -> Result<(), PlatformError>;

    /// Navigate and wait up to `deadline` for the load to complete.
    ///
    /// Implementations subscribe to load completion before starting the
    /// navigation so that fast loads are not missed.
    async fn load_url(
        &self,
        tab_id: &TabId,
        url: &str,
        deadline: Duration,
    ) -> Result<LoadOutcome, PlatformError>;

    /// Reload and wait up to `deadline`.
    async fn reload(&self, tab_id: &TabId, deadline: Duration)
    -> Result<LoadOutcome, PlatformError>;

    /// Step through the tab's own history. `Ok(false)` when there is nowhere to go.
    async fn history_step(
        &self,
        tab_id: &TabId,
        direction: HistoryDirection,
    ) -> Result<bool, PlatformError>;

    /// Capture the visible viewport as base64 PNG data.
    async fn capture_visible(&self, tab_id: &TabId) -> Result<String, PlatformError>;

    /// Run a JavaScript function declaration in the page with JSON arguments.
    async fn execute_script(
        &self,
        tab_id: &TabId,
        function: &str,
        args: &[Value],
    ) -> Result<Value, PlatformError>;
}
