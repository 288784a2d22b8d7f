//! Command execution loop.
//!
//! One command runs at a time: build, execute, settle, capture. Every
//! record produces an [`ExecutionResult`], failures included.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabpilot_config::{EngineConfig, VisionConfig};
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::commands::{Command, CommandFactory, CommandRecord};
use crate::history::NavigationHistory;
use crate::platform::{BrowserPlatform, StateStore};
use crate::resolver::{ElementResolver, VisionBackend};
use crate::tab::TabController;

/// Everything a command needs: the tab, its history, and the resolver.
pub struct Session {
    pub tabs: TabController,
    pub history: Arc<NavigationHistory>,
    pub resolver: ElementResolver,
}

impl Session {
    pub fn new(
        platform: Arc<dyn BrowserPlatform>,
        store: Arc<dyn StateStore>,
        vision: Option<Arc<dyn VisionBackend>>,
        engine: EngineConfig,
        vision_config: &VisionConfig,
    ) -> Self {
        let history = Arc::new(NavigationHistory::new());
        let resolver = ElementResolver::new(
            vision,
            vision_config.confidence_threshold,
            engine.click_settle_ms,
        );
        let tabs = TabController::new(platform, store, history.clone(), engine);
        Self {
            tabs,
            history,
            resolver,
        }
    }
}

/// Outcome reported for one command record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Base64 PNG of the viewport after the command, when one could be taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl ExecutionResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            warning: None,
            error: Some(error.into()),
            screenshot: None,
        }
    }
}

/// Serializes command execution against one [`Session`].
pub struct CommandExecutor {
    session: Session,
    settle: Duration,
    running: Mutex<()>,
}

impl CommandExecutor {
    pub fn new(session: Session) -> Self {
        let settle = Duration::from_millis(session.tabs.config().settle_ms);
        Self {
            session,
            settle,
            running: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Build and run a record. Malformed records fail without touching the browser.
    pub async fn execute_record(&self, record: &CommandRecord) -> ExecutionResult {
        match CommandFactory::create(record) {
            Ok(command) => self.execute(&command).await,
            Err(e) => {
                error!("Rejected {:?} command: {}", record.kind, e);
                ExecutionResult::failure(e.to_string())
            }
        }
    }

    /// Execute, let the page settle, then capture the viewport.
    #[instrument(skip(self), fields(kind = command.kind()))]
    pub async fn execute(&self, command: &Command) -> ExecutionResult {
        let _running = self.running.lock().await;

        let outcome = command.execute(&self.session).await;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        let screenshot = self.session.tabs.capture_screenshot().await;

        match outcome {
            Ok(outcome) => {
                info!("{}", outcome.message);
                ExecutionResult {
                    success: true,
                    message: Some(outcome.message),
                    warning: outcome.warning,
                    error: None,
                    screenshot,
                }
            }
            Err(e) => {
                error!("Command failed: {}", e);
                ExecutionResult {
                    success: false,
                    message: None,
                    warning: None,
                    error: Some(e.to_string()),
                    screenshot,
                }
            }
        }
    }

    /// Stop controlling the tab.
    pub async fn teardown(&self) {
        let _running = self.running.lock().await;
        self.session.tabs.release().await;
    }
}
