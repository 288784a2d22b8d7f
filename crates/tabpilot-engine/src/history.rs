//! Per-tab navigation history kept alongside the browser's own.
//!
//! The browser's native history also records redirects and in-page
//! navigations the engine never asked for. Back/forward prefer this list of
//! engine-issued URLs and fall back to the native history when it is too
//! short.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::platform::{HistoryDirection, TabId};
use crate::tab::TabController;

#[derive(Debug, Default)]
struct TabHistory {
    urls: Vec<String>,
    position: usize,
}

/// Result of a back/forward request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryMove {
    /// Moved through engine-tracked history to `url`.
    Tracked { url: String, position: usize },
    /// Delegated to the browser's native history.
    Native,
    /// Nowhere to go. The request is a successful no-op.
    Unavailable { warning: String },
}

impl HistoryMove {
    pub fn warning(&self) -> Option<&str> {
        match self {
            HistoryMove::Unavailable { warning } => Some(warning),
            _ => None,
        }
    }
}

/// Engine-issued URLs per tab with a cursor.
#[derive(Debug, Default)]
pub struct NavigationHistory {
    tabs: Mutex<HashMap<TabId, TabHistory>>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a navigation, dropping any forward entries past the cursor.
    pub fn track(&self, tab_id: &TabId, url: &str) {
        let mut tabs = self.tabs.lock();
        let history = tabs.entry(tab_id.clone()).or_default();
        if !history.urls.is_empty() {
            history.urls.truncate(history.position + 1);
        }
        history.urls.push(url.to_string());
        history.position = history.urls.len() - 1;
        debug!("History for {}: {} entries, at {}", tab_id, history.urls.len(), history.position);
    }

    pub fn current_position(&self, tab_id: &TabId) -> Option<usize> {
        self.tabs.lock().get(tab_id).map(|h| h.position)
    }

    /// Move the cursor. Out-of-range positions are rejected and leave it unchanged.
    pub fn set_position(&self, tab_id: &TabId, position: usize) -> bool {
        let mut tabs = self.tabs.lock();
        match tabs.get_mut(tab_id) {
            Some(history) if position < history.urls.len() => {
                history.position = position;
                true
            }
            _ => false,
        }
    }

    pub fn entries(&self, tab_id: &TabId) -> Vec<String> {
        self.tabs
            .lock()
            .get(tab_id)
            .map(|h| h.urls.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self, tab_id: &TabId) {
        if self.tabs.lock().remove(tab_id).is_some() {
            debug!("Cleared history for {}", tab_id);
        }
    }

    /// Neighbouring entry, only when at least two entries exist.
    fn peek(&self, tab_id: &TabId, direction: HistoryDirection) -> Option<(usize, String)> {
        let tabs = self.tabs.lock();
        let history = tabs.get(tab_id)?;
        if history.urls.len() < 2 {
            return None;
        }
        let target = match direction {
            HistoryDirection::Back => history.position.checked_sub(1)?,
            HistoryDirection::Forward => history.position + 1,
        };
        history.urls.get(target).map(|url| (target, url.clone()))
    }

    pub async fn back(&self, tabs: &TabController) -> Result<HistoryMove, EngineError> {
        self.step(tabs, HistoryDirection::Back).await
    }

    pub async fn forward(&self, tabs: &TabController) -> Result<HistoryMove, EngineError> {
        self.step(tabs, HistoryDirection::Forward).await
    }

    async fn step(
        &self,
        tabs: &TabController,
        direction: HistoryDirection,
    ) -> Result<HistoryMove, EngineError> {
        let tab = tabs.ensure_active().await?;

        if let Some((position, url)) = self.peek(&tab.tab_id, direction) {
            tabs.navigate_untracked(&url).await?;
            self.set_position(&tab.tab_id, position);
            info!("Went {} to {} (entry {})", direction, url, position);
            return Ok(HistoryMove::Tracked { url, position });
        }

        if tabs.native_history_step(direction).await? {
            info!("Went {} using browser history", direction);
            Ok(HistoryMove::Native)
        } else {
            Ok(HistoryMove::Unavailable {
                warning: format!("No history to go {}", direction),
            })
        }
    }
}
