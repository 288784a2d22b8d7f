//! Command family: one variant per browser action.
//!
//! Records arrive as loose JSON; [`CommandFactory`] validates them into
//! [`Command`] values which execute against a [`Session`].

mod click;
mod factory;
mod navigation;
mod page;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::Session;
use crate::error::EngineError;

pub use self::factory::CommandFactory;
pub use self::navigation::format_target;

/// Default scroll distance in pixels.
pub const DEFAULT_SCROLL_AMOUNT: u32 = 300;

/// Loosely typed command as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_first_result: Option<bool>,
}

impl CommandRecord {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

impl ScrollDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Top => "top",
            ScrollDirection::Bottom => "bottom",
        }
    }
}

impl FromStr for ScrollDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "top" => Ok(ScrollDirection::Top),
            "bottom" => Ok(ScrollDirection::Bottom),
            other => Err(format!("unsupported scroll direction '{}'", other)),
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, executable command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load a URL or domain-like string, searching when it is neither.
    Navigate { url: String, skip_first_result: bool },
    /// Fill and submit the page's own search box.
    Search { query: String },
    Back,
    Forward,
    Refresh,
    Scroll { direction: ScrollDirection, amount: u32 },
    /// Bring text into view.
    Find { text: String },
    /// Click by DOM text matching only.
    FindAndClick { text: String },
    /// Click by intent: DOM, vision, relaxed DOM, then label scan.
    SmartClick { intent: String },
    Type { text: String, target: Option<String> },
    PressEnter,
}

/// What a successful command reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub message: String,
    pub warning: Option<String>,
}

impl CommandOutcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

impl Command {
    /// Canonical record kind for this command.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Navigate { .. } => "navigation",
            Command::Search { .. } => "search",
            Command::Back => "back",
            Command::Forward => "forward",
            Command::Refresh => "refresh",
            Command::Scroll { .. } => "scroll",
            Command::Find { .. } => "find",
            Command::FindAndClick { .. } => "findAndClick",
            Command::SmartClick { .. } => "smartClick",
            Command::Type { .. } => "input",
            Command::PressEnter => "press_enter",
        }
    }

    pub async fn execute(&self, session: &Session) -> Result<CommandOutcome, EngineError> {
        match self {
            Command::Navigate {
                url,
                skip_first_result,
            } => navigation::navigate(session, url, *skip_first_result).await,
            Command::Search { query } => navigation::search(session, query).await,
            Command::Back => navigation::back(session).await,
            Command::Forward => navigation::forward(session).await,
            Command::Refresh => navigation::refresh(session).await,
            Command::Scroll { direction, amount } => page::scroll(session, *direction, *amount).await,
            Command::Find { text } => page::find(session, text).await,
            Command::FindAndClick { text } => click::find_and_click(session, text).await,
            Command::SmartClick { intent } => click::smart_click(session, intent).await,
            Command::Type { text, target } => page::type_text(session, text, target.as_deref()).await,
            Command::PressEnter => page::press_enter(session).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserialize_camel_case() {
        let json = r#"{"type": "navigation", "url": "example.com", "skipFirstResult": true}"#;
        let record: CommandRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, "navigation");
        assert_eq!(record.url.as_deref(), Some("example.com"));
        assert_eq!(record.skip_first_result, Some(true));
        assert!(record.query.is_none());
    }

    #[test]
    fn test_record_serialize_skips_empty() {
        let record = CommandRecord::new("back");
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"type":"back"}"#);
    }

    #[test]
    fn test_scroll_direction_parse() {
        assert_eq!("Down".parse::<ScrollDirection>(), Ok(ScrollDirection::Down));
        assert_eq!(" top ".parse::<ScrollDirection>(), Ok(ScrollDirection::Top));
        assert!("sideways".parse::<ScrollDirection>().is_err());
    }

    #[test]
    fn test_outcome_warning() {
        let outcome = CommandOutcome::new("Nothing to do").with_warning("No history");
        assert_eq!(outcome.warning.as_deref(), Some("No history"));
    }
}
