//! Core session struct and CDP command dispatch.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace};

use crate::cdp::client::Connection;
use crate::cdp::error::CdpError;
use crate::cdp::protocol::{CdpEvent, ScreenshotFormat};

/// A session attached to a single page/target.
pub struct PageSession {
    /// Target ID.
    pub(super) target_id: String,
    /// Session ID for this target.
    pub(super) session_id: String,
    /// Connection shared with the client.
    pub(super) conn: Arc<Connection>,
    /// Fan-out of events routed to this session.
    pub(super) events: broadcast::Sender<CdpEvent>,
}

impl PageSession {
    /// Create a new page session.
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        conn: Arc<Connection>,
        events: broadcast::Sender<CdpEvent>,
    ) -> Self {
        Self {
            target_id,
            session_id,
            conn,
            events,
        }
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Get session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.conn.call(method, params, Some(&self.session_id)).await
    }

    /// Subscribe to events for this session.
    ///
    /// Subscribe before issuing the command whose event you wait for, or the
    /// event may be missed.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Wait until `method` arrives on `events`. Returns `false` on deadline.
    pub(crate) async fn wait_for_event(
        &self,
        events: &mut broadcast::Receiver<CdpEvent>,
        method: &str,
        deadline: Duration,
    ) -> Result<bool, CdpError> {
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(event) if event.method == method => return Ok(()),
                    Ok(event) => trace!("Skipping event {} while waiting for {}", event.method, method),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Event subscriber lagged by {} events", skipped)
                    }
                    Err(RecvError::Closed) => return Err(CdpError::SessionClosed),
                }
            }
        };

        match tokio::time::timeout(deadline, wait).await {
            Ok(result) => result.map(|_| true),
            Err(_) => Ok(false),
        }
    }

    /// Enable required CDP domains.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Capture the visible viewport. Returns base64 image data.
    pub async fn screenshot(
        &self,
        format: ScreenshotFormat,
        quality: Option<u8>,
    ) -> Result<String, CdpError> {
        let mut params = json!({
            "format": format,
            "captureBeyondViewport": false,
        });

        if let Some(q) = quality {
            params["quality"] = json!(q);
        }

        let result = self.call("Page.captureScreenshot", Some(params)).await?;

        result["data"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing screenshot data".to_string()))
    }
}
