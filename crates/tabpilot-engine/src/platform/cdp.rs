//! [`BrowserPlatform`] backed by Chrome over CDP.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tabpilot_config::BrowserConfig;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cdp::{CdpClient, CdpError, PageSession, ScreenshotFormat, WindowBounds, WindowState};

use super::{
    BrowserPlatform, ChromeLauncher, HistoryDirection, LoadOutcome, PlatformError, TabId,
    TabInfo, WindowId,
};

/// Minimum spacing between viewport captures, mirroring browser capture quotas.
const MIN_CAPTURE_INTERVAL: Duration = Duration::from_millis(500);

/// Deadline for native history steps.
const HISTORY_STEP_DEADLINE: Duration = Duration::from_secs(30);

/// Chrome driven through the DevTools protocol.
pub struct CdpPlatform {
    client: CdpClient,
    /// Present when this process launched Chrome itself.
    launcher: Option<ChromeLauncher>,
    sessions: RwLock<HashMap<TabId, Arc<PageSession>>>,
    window_size: (u32, u32),
    last_capture: Mutex<Option<Instant>>,
}

impl CdpPlatform {
    /// Launch Chrome if nothing answers on the debug port, then connect.
    pub async fn start(config: &BrowserConfig) -> Result<Self, PlatformError> {
        let launcher = ChromeLauncher::new(config.clone());
        let launched = !launcher.is_running().await;
        launcher.ensure_running().await?;

        let mut platform =
            Self::connect(&config.endpoint(), (config.window_width, config.window_height)).await?;
        if launched {
            platform.launcher = Some(launcher);
        }
        Ok(platform)
    }

    /// Connect to an already running Chrome.
    pub async fn connect(endpoint: &str, window_size: (u32, u32)) -> Result<Self, PlatformError> {
        let client = CdpClient::connect(endpoint).await?;
        info!("Connected to Chrome at {}", endpoint);
        Ok(Self {
            client,
            launcher: None,
            sessions: RwLock::new(HashMap::new()),
            window_size,
            last_capture: Mutex::new(None),
        })
    }

    /// Detach sessions and stop Chrome if we launched it.
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        for (tab_id, session) in sessions {
            if let Err(e) = self.client.detach(&session).await {
                debug!("Detach from {} failed: {}", tab_id, e);
            }
        }
        if let Some(launcher) = &self.launcher {
            launcher.shutdown().await;
        }
        info!("Browser connection closed");
    }

    /// Cached page session for a tab, attaching on first use.
    async fn session(&self, tab_id: &TabId) -> Result<Arc<PageSession>, PlatformError> {
        if let Some(session) = self.sessions.read().await.get(tab_id) {
            return Ok(session.clone());
        }

        let session = self
            .client
            .attach(tab_id.as_str())
            .await
            .map_err(|e| tab_error(tab_id, e))?;
        let session = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(tab_id.clone(), session.clone());
        debug!("Attached to tab {}", tab_id);
        Ok(session)
    }

    async fn forget(&self, tab_id: &TabId) {
        self.sessions.write().await.remove(tab_id);
    }

    /// Claim a capture slot or report the quota as exhausted.
    fn claim_capture_slot(&self) -> Result<(), PlatformError> {
        let mut last = self.last_capture.lock();
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < MIN_CAPTURE_INTERVAL {
                return Err(PlatformError::RateLimited);
            }
        }
        *last = Some(now);
        Ok(())
    }
}

/// Protocol errors against a specific target mean the target is gone.
fn tab_error(tab_id: &TabId, e: CdpError) -> PlatformError {
    match e {
        CdpError::Protocol { .. } => PlatformError::TabNotFound(tab_id.to_string()),
        other => other.into(),
    }
}

fn load_outcome(loaded: bool) -> LoadOutcome {
    if loaded {
        LoadOutcome::Completed
    } else {
        LoadOutcome::TimedOut
    }
}

#[async_trait]
impl BrowserPlatform for CdpPlatform {
    async fn get_tab(&self, tab_id: &TabId) -> Result<TabInfo, PlatformError> {
        let info = match self.client.target_info(tab_id.as_str()).await {
            Ok(info) => info,
            Err(e) => {
                self.forget(tab_id).await;
                return Err(tab_error(tab_id, e));
            }
        };
        let (window_id, _) = self
            .client
            .window_for_target(tab_id.as_str())
            .await
            .map_err(|e| tab_error(tab_id, e))?;

        Ok(TabInfo {
            tab_id: tab_id.clone(),
            window_id: WindowId::new(window_id.to_string()),
            url: info.url,
        })
    }

    async fn create_window(&self, url: &str) -> Result<TabInfo, PlatformError> {
        let target_id = self.client.create_target(url, true).await?;
        let tab_id = TabId::new(target_id);
        let info = self.get_tab(&tab_id).await?;

        if let Ok(window_id) = info.window_id.as_str().parse::<i64>() {
            let bounds = WindowBounds {
                left: None,
                top: None,
                width: Some(self.window_size.0 as i64),
                height: Some(self.window_size.1 as i64),
                window_state: None,
            };
            if let Err(e) = self.client.set_window_bounds(window_id, &bounds).await {
                warn!("Failed to size window {}: {}", window_id, e);
            }
        }

        Ok(info)
    }

    async fn focus_window(&self, window_id: &WindowId) -> Result<(), PlatformError> {
        let id = window_id
            .as_str()
            .parse::<i64>()
            .map_err(|_| PlatformError::Request(format!("Invalid window id: {}", window_id)))?;
        let bounds = WindowBounds {
            left: None,
            top: None,
            width: None,
            height: None,
            window_state: Some(WindowState::Normal),
        };
        self.client.set_window_bounds(id, &bounds).await?;
        Ok(())
    }

    async fn activate_tab(&self, tab_id: &TabId) -> Result<(), PlatformError> {
        self.client
            .activate_target(tab_id.as_str())
            .await
            .map_err(|e| tab_error(tab_id, e))
    }

    async fn load_url(
        &self,
        tab_id: &TabId,
        url: &str,
        deadline: Duration,
    ) -> Result<LoadOutcome, PlatformError> {
        let session = self.session(tab_id).await?;
        let loaded = session.navigate_and_wait(url, deadline).await?;
        Ok(load_outcome(loaded))
    }

    async fn reload(
        &self,
        tab_id: &TabId,
        deadline: Duration,
    ) -> Result<LoadOutcome, PlatformError> {
        let session = self.session(tab_id).await?;
        let loaded = session.reload_and_wait(deadline).await?;
        Ok(load_outcome(loaded))
    }

    async fn history_step(
        &self,
        tab_id: &TabId,
        direction: HistoryDirection,
    ) -> Result<bool, PlatformError> {
        let session = self.session(tab_id).await?;
        Ok(session
            .step_history(direction.offset(), HISTORY_STEP_DEADLINE)
            .await?)
    }

    async fn capture_visible(&self, tab_id: &TabId) -> Result<String, PlatformError> {
        self.claim_capture_slot()?;
        let session = self.session(tab_id).await?;
        Ok(session.screenshot(ScreenshotFormat::Png, None).await?)
    }

    async fn execute_script(
        &self,
        tab_id: &TabId,
        function: &str,
        args: &[Value],
    ) -> Result<Value, PlatformError> {
        let session = self.session(tab_id).await?;
        Ok(session.call_function(function, args).await?)
    }
}
