//! CDP WebSocket client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use super::error::CdpError;
use super::protocol::{
    BrowserVersion, CdpEvent, CdpRequest, CdpResponse, TargetInfo, WindowBounds,
};
use super::session::PageSession;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Per-request deadline for CDP round trips.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered events per session before slow subscribers start lagging.
const EVENT_BUFFER: usize = 64;

/// Pending request waiting for response.
struct PendingRequest {
    tx: oneshot::Sender<Result<Value, CdpError>>,
}

/// Shared half of the WebSocket: request dispatch plus event routing.
///
/// Held by the client and by every attached [`PageSession`].
pub(crate) struct Connection {
    ws_tx: tokio::sync::Mutex<WsSink>,
    request_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    event_handlers: RwLock<HashMap<String, broadcast::Sender<CdpEvent>>>,
}

impl Connection {
    /// Send a CDP command and wait for its response.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(json.into())).await {
                self.pending.lock().remove(&id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    /// Register an event channel for a session and return its sender.
    fn register_session(&self, session_id: &str) -> broadcast::Sender<CdpEvent> {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        self.event_handlers
            .write()
            .insert(session_id.to_string(), tx.clone());
        tx
    }

    fn unregister_session(&self, session_id: &str) {
        self.event_handlers.write().remove(session_id);
    }

    fn dispatch(&self, resp: CdpResponse) {
        if let Some(id) = resp.id {
            let pending_req = self.pending.lock().remove(&id);
            if let Some(req) = pending_req {
                let result = match resp.error {
                    Some(error) => Err(CdpError::Protocol {
                        code: error.code,
                        message: error.message,
                    }),
                    None => Ok(resp.result.unwrap_or(Value::Null)),
                };
                let _ = req.tx.send(result);
            }
        } else if let Some(method) = resp.method {
            let session_id = resp.session_id.unwrap_or_default();
            let handlers = self.event_handlers.read();
            if let Some(tx) = handlers.get(&session_id) {
                // No live subscribers is the common case; nothing to report.
                let _ = tx.send(CdpEvent {
                    method,
                    params: resp.params.unwrap_or(Value::Null),
                });
            }
        }
    }
}

/// CDP client for browser control.
///
/// Connects to Chrome via WebSocket and exposes the browser-level (target and
/// window) commands. Page-level commands go through [`PageSession`].
pub struct CdpClient {
    conn: Arc<Connection>,
    /// Background task handle.
    _recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to Chrome at the given endpoint.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Chrome debugging endpoint (e.g., "http://localhost:9222")
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let http_endpoint = endpoint.trim_end_matches('/');

        let version_url = format!("{}/json/version", http_endpoint);
        debug!("Fetching browser version from {}", version_url);

        let version: BrowserVersion = reqwest::get(&version_url)
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?;

        debug!("Connected to browser: {}", version.browser);

        let browser_ws_url = version.web_socket_debugger_url;

        let (ws_stream, _) = tokio_tungstenite::connect_async(&browser_ws_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let conn = Arc::new(Connection {
            ws_tx: tokio::sync::Mutex::new(ws_sink),
            request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            event_handlers: RwLock::new(HashMap::new()),
        });

        let recv_task = {
            let conn = conn.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, conn).await;
            })
        };

        debug!("CDP client connected to {}", browser_ws_url);

        Ok(Self {
            conn,
            _recv_task: recv_task,
        })
    }

    /// WebSocket receive loop.
    async fn receive_loop(mut ws_source: WsSource, conn: Arc<Connection>) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {}", text);
                    match serde_json::from_str::<CdpResponse>(&text) {
                        Ok(resp) => conn.dispatch(resp),
                        Err(e) => warn!("Failed to parse CDP message: {}", e),
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket closed");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        // Dropping the senders fails every in-flight call with SessionClosed.
        conn.pending.lock().clear();
        conn.event_handlers.write().clear();
    }

    /// Send a browser-level CDP command and wait for response.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.conn.call(method, params, None).await
    }

    // ========================================================================
    // Target Management
    // ========================================================================

    /// Create a page target, optionally in a fresh window. Returns the target id.
    pub async fn create_target(&self, url: &str, new_window: bool) -> Result<String, CdpError> {
        let result = self
            .call(
                "Target.createTarget",
                Some(json!({
                    "url": url,
                    "newWindow": new_window,
                })),
            )
            .await?;

        let target_id = result["targetId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing targetId".to_string()))?
            .to_string();
        debug!("Created target {} at {}", target_id, url);
        Ok(target_id)
    }

    /// Attach to an existing page target.
    pub async fn attach(&self, target_id: &str) -> Result<PageSession, CdpError> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
            )
            .await?;

        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))?
            .to_string();

        let events = self.conn.register_session(&session_id);
        let session = PageSession::new(
            target_id.to_string(),
            session_id,
            self.conn.clone(),
            events,
        );

        session.enable_domains().await?;

        Ok(session)
    }

    /// Detach a previously attached session.
    pub async fn detach(&self, session: &PageSession) -> Result<(), CdpError> {
        self.conn.unregister_session(session.session_id());
        self.call(
            "Target.detachFromTarget",
            Some(json!({"sessionId": session.session_id()})),
        )
        .await?;
        Ok(())
    }

    /// Look up a single target.
    pub async fn target_info(&self, target_id: &str) -> Result<TargetInfo, CdpError> {
        let result = self
            .call(
                "Target.getTargetInfo",
                Some(json!({"targetId": target_id})),
            )
            .await?;
        let info: TargetInfo = serde_json::from_value(result["targetInfo"].clone())?;
        Ok(info)
    }

    /// Bring a target to the foreground within its window.
    pub async fn activate_target(&self, target_id: &str) -> Result<(), CdpError> {
        self.call(
            "Target.activateTarget",
            Some(json!({"targetId": target_id})),
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // Window Management
    // ========================================================================

    /// Window that hosts a target, with its current bounds.
    pub async fn window_for_target(
        &self,
        target_id: &str,
    ) -> Result<(i64, WindowBounds), CdpError> {
        let result = self
            .call(
                "Browser.getWindowForTarget",
                Some(json!({"targetId": target_id})),
            )
            .await?;

        let window_id = result["windowId"]
            .as_i64()
            .ok_or_else(|| CdpError::InvalidResponse("Missing windowId".to_string()))?;
        let bounds: WindowBounds = serde_json::from_value(result["bounds"].clone())?;
        Ok((window_id, bounds))
    }

    /// Update window bounds or state.
    pub async fn set_window_bounds(
        &self,
        window_id: i64,
        bounds: &WindowBounds,
    ) -> Result<(), CdpError> {
        self.call(
            "Browser.setWindowBounds",
            Some(json!({
                "windowId": window_id,
                "bounds": bounds,
            })),
        )
        .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._recv_task.abort();
    }
}
