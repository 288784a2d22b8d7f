//! In-page commands: scroll, find, type, press Enter.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{CommandOutcome, ScrollDirection};
use crate::engine::Session;
use crate::error::EngineError;
use crate::scripts;

pub(super) async fn scroll(
    session: &Session,
    direction: ScrollDirection,
    amount: u32,
) -> Result<CommandOutcome, EngineError> {
    let offset = session
        .tabs
        .execute_script(scripts::SCROLL, &[json!(direction.as_str()), json!(amount)])
        .await?;
    debug!("Scroll offset before settle: {}", offset);
    session
        .tabs
        .settle(session.tabs.config().scroll_settle_ms)
        .await;

    let message = match direction {
        ScrollDirection::Up | ScrollDirection::Down => {
            format!("Scrolled {} by {}px", direction, amount)
        }
        ScrollDirection::Top | ScrollDirection::Bottom => format!("Scrolled to {}", direction),
    };
    Ok(CommandOutcome::new(message))
}

pub(super) async fn find(session: &Session, text: &str) -> Result<CommandOutcome, EngineError> {
    let found = session
        .tabs
        .execute_script(scripts::FIND_TEXT, &[json!(text)])
        .await?;
    if found.as_bool().unwrap_or(false) {
        Ok(CommandOutcome::new(format!("Found \"{}\"", text)))
    } else {
        Err(EngineError::NotFound(format!(
            "Text \"{}\" not found on page",
            text
        )))
    }
}

#[derive(Debug, Deserialize)]
struct TypeReport {
    success: bool,
    tag: Option<String>,
}

pub(super) async fn type_text(
    session: &Session,
    text: &str,
    target: Option<&str>,
) -> Result<CommandOutcome, EngineError> {
    let raw = session
        .tabs
        .execute_script(
            scripts::TYPE_TEXT,
            &[json!(text), target.map_or(Value::Null, |t| json!(t))],
        )
        .await?;
    let report: TypeReport = serde_json::from_value(raw)
        .map_err(|e| EngineError::Script(format!("unexpected input result: {}", e)))?;

    if !report.success {
        return Err(EngineError::NotFound(match target {
            Some(target) => format!("No text field matching \"{}\"", target),
            None => "No text field found to type into".to_string(),
        }));
    }
    Ok(CommandOutcome::new(format!(
        "Typed \"{}\" into {}",
        text,
        report.tag.as_deref().unwrap_or("field")
    )))
}

pub(super) async fn press_enter(session: &Session) -> Result<CommandOutcome, EngineError> {
    let pressed = session
        .tabs
        .execute_script(scripts::PRESS_ENTER, &[])
        .await?;
    if pressed.as_bool().unwrap_or(false) {
        Ok(CommandOutcome::new("Pressed Enter"))
    } else {
        Err(EngineError::ActionFailed(
            "No focused element to press Enter on".to_string(),
        ))
    }
}
