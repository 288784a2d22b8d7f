//! Engine error types.

use thiserror::Error;

use crate::platform::PlatformError;

/// Errors surfaced by the engine to command callers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Target URL failed normalization or is not an http(s) address.
    #[error("Invalid or unsupported URL: {0}")]
    InvalidUrl(String),

    #[error("Unknown command type: {0}")]
    UnknownCommand(String),

    /// Record is missing or has malformed parameters for its kind.
    #[error("Invalid {kind} command: {reason}")]
    InvalidCommand { kind: String, reason: String },

    /// Tab self-healing could not produce a replacement tab.
    #[error("Failed to create controlled tab: {0}")]
    TabCreation(#[source] PlatformError),

    #[error("Script execution failed: {0}")]
    Script(String),

    /// Element or page content could not be resolved after every fallback.
    #[error("{0}")]
    NotFound(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl EngineError {
    pub(crate) fn invalid(kind: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidCommand {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    /// Script failures keep their own variant; other platform errors pass through.
    pub(crate) fn from_script(e: PlatformError) -> Self {
        match e {
            PlatformError::Script(msg) => EngineError::Script(msg),
            other => EngineError::Platform(other),
        }
    }
}
