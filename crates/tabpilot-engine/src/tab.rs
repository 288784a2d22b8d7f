//! Ownership of the single controlled tab.
//!
//! [`TabController`] keeps exactly one tab under control, heals it when it is
//! closed or drifts onto a browser-internal page, and funnels every
//! navigation, script, and capture through the guard.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tabpilot_config::EngineConfig;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::guard::{self, BLANK_TARGET};
use crate::history::NavigationHistory;
use crate::platform::{
    BrowserPlatform, HistoryDirection, LoadOutcome, PlatformError, StateStore, TabId, TabInfo,
    WindowId,
};
use crate::scripts;

/// The tab currently under control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlledTab {
    pub tab_id: TabId,
    pub window_id: WindowId,
    pub last_known_url: Option<String>,
}

impl ControlledTab {
    fn from_info(info: TabInfo) -> Self {
        Self {
            tab_id: info.tab_id,
            window_id: info.window_id,
            last_known_url: Some(info.url),
        }
    }
}

/// Backoff before retry number `attempt + 1`: `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Maintains the controlled tab and performs guarded page operations on it.
pub struct TabController {
    platform: Arc<dyn BrowserPlatform>,
    store: Arc<dyn StateStore>,
    history: Arc<NavigationHistory>,
    config: EngineConfig,
    current: RwLock<Option<ControlledTab>>,
}

impl TabController {
    pub fn new(
        platform: Arc<dyn BrowserPlatform>,
        store: Arc<dyn StateStore>,
        history: Arc<NavigationHistory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            platform,
            store,
            history,
            config,
            current: RwLock::new(None),
        }
    }

    /// Readopt the tab persisted by a previous run, if it still exists.
    pub async fn restore(&self) -> Option<ControlledTab> {
        let tab_id = self.store.load_tab_id()?;
        match self.platform.get_tab(&tab_id).await {
            Ok(info) => {
                let tab = ControlledTab::from_info(info);
                info!("Restored controlled tab {}", tab.tab_id);
                *self.current.write().await = Some(tab.clone());
                Some(tab)
            }
            Err(e) => {
                debug!("Persisted tab {} is gone: {}", tab_id, e);
                None
            }
        }
    }

    /// Snapshot of the controlled tab without touching the browser.
    pub async fn current(&self) -> Option<ControlledTab> {
        self.current.read().await.clone()
    }

    /// Guarantee a live, focused, non-internal controlled tab.
    ///
    /// Creates one when none exists, replaces it when it vanished or shows a
    /// browser-internal page, and otherwise focuses its window and activates
    /// it. A tab that cannot be focused or activated is replaced as well. Only a
    /// failure to create a replacement is returned as an error.
    pub async fn ensure_active(&self) -> Result<ControlledTab, EngineError> {
        let Some(tab) = self.current().await else {
            return self.create_tab().await;
        };

        let info = match self.platform.get_tab(&tab.tab_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Controlled tab {} unavailable ({}), creating a new one", tab.tab_id, e);
                return self.create_tab().await;
            }
        };

        // A fresh window would land on the same blank page, so keep it.
        if guard::is_internal(&info.url) && info.url != BLANK_TARGET {
            info!("Controlled tab {} shows internal page {}, replacing", tab.tab_id, info.url);
            return self.create_tab().await;
        }

        if let Err(e) = self.platform.focus_window(&info.window_id).await {
            warn!("Failed to focus window {} ({}), creating a new tab", info.window_id, e);
            return self.create_tab().await;
        }
        if let Err(e) = self.platform.activate_tab(&info.tab_id).await {
            warn!("Failed to activate tab {} ({}), creating a new tab", info.tab_id, e);
            return self.create_tab().await;
        }
        self.settle(self.config.activation_settle_ms).await;

        let refreshed = ControlledTab::from_info(info);
        *self.current.write().await = Some(refreshed.clone());
        Ok(refreshed)
    }

    /// Open a new window at the blank target and take control of its tab.
    pub async fn create_tab(&self) -> Result<ControlledTab, EngineError> {
        let info = self
            .platform
            .create_window(BLANK_TARGET)
            .await
            .map_err(EngineError::TabCreation)?;
        let tab = ControlledTab::from_info(info);

        if let Err(e) = self.store.save_tab_id(&tab.tab_id) {
            warn!("Failed to persist controlled tab id: {}", e);
        }

        let previous = self.current.write().await.replace(tab.clone());
        if let Some(old) = previous {
            self.history.clear(&old.tab_id);
        }

        info!("Created controlled tab {} in window {}", tab.tab_id, tab.window_id);
        Ok(tab)
    }

    /// Navigate the controlled tab and record the URL in custom history.
    ///
    /// Returns the normalized URL that was loaded.
    pub async fn navigate(&self, url: &str) -> Result<String, EngineError> {
        let tab = self.ensure_active().await?;
        let target = guard::normalize_url(url);
        if !guard::is_valid_external_target(&target) {
            return Err(EngineError::InvalidUrl(url.to_string()));
        }

        self.load(&tab, &target).await?;
        self.history.track(&tab.tab_id, &target);
        Ok(target)
    }

    /// Navigate without touching custom history, for history moves.
    pub(crate) async fn navigate_untracked(&self, url: &str) -> Result<(), EngineError> {
        let tab = self.ensure_active().await?;
        if !guard::is_valid_external_target(url) {
            return Err(EngineError::InvalidUrl(url.to_string()));
        }
        self.load(&tab, url).await
    }

    async fn load(&self, tab: &ControlledTab, url: &str) -> Result<(), EngineError> {
        let deadline = Duration::from_secs(self.config.navigation_timeout_secs);
        match self.platform.load_url(&tab.tab_id, url, deadline).await? {
            LoadOutcome::Completed => debug!("Loaded {}", url),
            LoadOutcome::TimedOut => {
                warn!("Load of {} did not complete within {:?}, proceeding", url, deadline)
            }
        }
        self.after_load(&tab.tab_id, url.to_string()).await;
        Ok(())
    }

    /// Reload the controlled tab.
    pub async fn reload(&self) -> Result<(), EngineError> {
        let tab = self.ensure_active().await?;
        let deadline = Duration::from_secs(self.config.navigation_timeout_secs);
        if self.platform.reload(&tab.tab_id, deadline).await? == LoadOutcome::TimedOut {
            warn!("Reload did not complete within {:?}, proceeding", deadline);
        }
        if let Some(url) = tab.last_known_url {
            self.after_load(&tab.tab_id, url).await;
        }
        Ok(())
    }

    /// Step through the browser's own history for the controlled tab.
    pub async fn native_history_step(
        &self,
        direction: HistoryDirection,
    ) -> Result<bool, EngineError> {
        let tab = self.ensure_active().await?;
        let moved = self.platform.history_step(&tab.tab_id, direction).await?;
        if moved {
            self.settle(self.config.post_navigation_settle_ms).await;
            match self.platform.get_tab(&tab.tab_id).await {
                Ok(info) => self.after_load(&tab.tab_id, info.url).await,
                Err(e) => debug!("Could not refresh tab after history step: {}", e),
            }
        }
        Ok(moved)
    }

    /// Catch up with a navigation the page started on its own, such as a
    /// clicked link. `expected_url` stands in when the tab cannot be queried.
    pub(crate) async fn follow_page_navigation(&self, expected_url: &str) {
        let Some(tab) = self.current().await else {
            return;
        };
        self.settle(self.config.post_navigation_settle_ms).await;
        let url = match self.platform.get_tab(&tab.tab_id).await {
            Ok(info) => info.url,
            Err(e) => {
                debug!("Could not refresh tab after page navigation: {}", e);
                expected_url.to_string()
            }
        };
        self.after_load(&tab.tab_id, url).await;
    }

    async fn after_load(&self, tab_id: &TabId, url: String) {
        self.settle(self.config.post_navigation_settle_ms).await;
        let internal = guard::is_internal(&url);
        if let Some(tab) = self.current.write().await.as_mut() {
            tab.last_known_url = Some(url);
        }
        if !internal {
            self.inject_cursor_overlay(tab_id).await;
        }
    }

    /// Best-effort visual cursor. Page loads wipe it, so it is re-applied after each.
    async fn inject_cursor_overlay(&self, tab_id: &TabId) {
        if !self.config.cursor_overlay {
            return;
        }
        if let Err(e) = self
            .platform
            .execute_script(tab_id, scripts::CURSOR_OVERLAY, &[])
            .await
        {
            debug!("Cursor overlay not injected: {}", e);
        }
    }

    /// Visible viewport as base64 PNG, or `None` when capture is impossible.
    ///
    /// Rate-limit rejections are retried with exponential backoff; any other
    /// failure gives up immediately.
    pub async fn capture_screenshot(&self) -> Option<String> {
        let tab = match self.ensure_active().await {
            Ok(tab) => tab,
            Err(e) => {
                warn!("Screenshot skipped: {}", e);
                return None;
            }
        };

        if tab.last_known_url.as_deref().is_none_or(guard::is_internal) {
            debug!("Screenshot skipped on internal page");
            return None;
        }

        let max_attempts = self.config.screenshot_max_attempts.max(1);
        let base = Duration::from_millis(self.config.screenshot_backoff_base_ms);
        for attempt in 0..max_attempts {
            match self.platform.capture_visible(&tab.tab_id).await {
                Ok(data) => return Some(data),
                Err(PlatformError::RateLimited) if attempt + 1 < max_attempts => {
                    let delay = backoff_delay(base, attempt);
                    debug!("Capture rate limited, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(PlatformError::RateLimited) => {
                    warn!("Capture still rate limited after {} attempts", max_attempts);
                }
                Err(e) => {
                    warn!("Screenshot failed: {}", e);
                    return None;
                }
            }
        }
        None
    }

    /// Run a function declaration in the controlled tab. Errors propagate.
    pub async fn execute_script(
        &self,
        function: &str,
        args: &[Value],
    ) -> Result<Value, EngineError> {
        let tab = self.ensure_active().await?;
        self.platform
            .execute_script(&tab.tab_id, function, args)
            .await
            .map_err(EngineError::from_script)
    }

    /// Drop control of the tab, leaving the persisted id for the next run.
    pub async fn release(&self) {
        if let Some(tab) = self.current.write().await.take() {
            self.history.clear(&tab.tab_id);
            info!("Released controlled tab {}", tab.tab_id);
        }
    }

    pub(crate) async fn settle(&self, millis: u64) {
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let delay = backoff_delay(Duration::from_secs(u64::MAX / 2), 40);
        assert_eq!(delay, Duration::MAX);
    }
}
