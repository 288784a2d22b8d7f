//! Navigation operations for CDP page session.

use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::NavigationHistorySnapshot;

use super::core::PageSession;

const LOAD_EVENT: &str = "Page.loadEventFired";

impl PageSession {
    /// Navigate to URL and wait for the load event.
    ///
    /// Returns `false` when `deadline` elapsed before the page finished loading.
    pub async fn navigate_and_wait(&self, url: &str, deadline: Duration) -> Result<bool, CdpError> {
        let mut events = self.subscribe();

        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText") {
            return Err(CdpError::NavigationFailed(
                error.as_str().unwrap_or("Unknown error").to_string(),
            ));
        }

        // Same-document navigations never fire a load event.
        if result.get("loaderId").is_none() {
            debug!("Same-document navigation to {}", url);
            return Ok(true);
        }

        let loaded = self.wait_for_event(&mut events, LOAD_EVENT, deadline).await?;
        debug!("Navigated to {} (loaded: {})", url, loaded);
        Ok(loaded)
    }

    /// Reload page and wait for the load event.
    pub async fn reload_and_wait(&self, deadline: Duration) -> Result<bool, CdpError> {
        let mut events = self.subscribe();
        self.call("Page.reload", None).await?;
        self.wait_for_event(&mut events, LOAD_EVENT, deadline).await
    }

    /// Native per-tab history.
    pub async fn navigation_history(&self) -> Result<NavigationHistorySnapshot, CdpError> {
        let history = self.call("Page.getNavigationHistory", None).await?;
        Ok(serde_json::from_value(history)?)
    }

    /// Move `offset` entries through native history.
    ///
    /// Returns `false` without navigating when no such entry exists.
    pub async fn step_history(&self, offset: i64, deadline: Duration) -> Result<bool, CdpError> {
        let history = self.navigation_history().await?;
        let Some(entry) = history.relative(offset) else {
            return Ok(false);
        };

        let mut events = self.subscribe();
        self.call(
            "Page.navigateToHistoryEntry",
            Some(json!({"entryId": entry.id})),
        )
        .await?;

        if !self.wait_for_event(&mut events, LOAD_EVENT, deadline).await? {
            debug!("History step to {} did not report load in time", entry.url);
        }
        Ok(true)
    }
}
