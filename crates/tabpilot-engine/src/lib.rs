//! # TabPilot Engine
//!
//! Drives a single browser tab from structured commands: guarded navigation
//! with custom history, element resolution with a vision fallback, and a
//! serialized execution loop that screenshots after every command.
//!
//! Chrome is reached over CDP through [`platform::CdpPlatform`]; anything
//! implementing [`platform::BrowserPlatform`] can stand in for it.

pub mod cdp;
pub mod commands;
pub mod engine;
pub mod error;
pub mod guard;
pub mod history;
pub mod platform;
pub mod resolver;
pub mod scripts;
pub mod tab;

pub use commands::{Command, CommandFactory, CommandOutcome, CommandRecord, ScrollDirection};
pub use engine::{CommandExecutor, ExecutionResult, Session};
pub use error::EngineError;
pub use history::{HistoryMove, NavigationHistory};
pub use platform::{BrowserPlatform, CdpPlatform, PlatformError, TabId, TabInfo, WindowId};
pub use resolver::{ElementMatch, ElementResolver, OllamaVision, Resolution, VisionBackend};
pub use tab::{ControlledTab, TabController};
