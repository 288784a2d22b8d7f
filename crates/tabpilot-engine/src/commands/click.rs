//! Click commands.

use serde_json::json;
use tracing::{debug, info, warn};

use super::CommandOutcome;
use crate::engine::Session;
use crate::error::EngineError;
use crate::resolver::{ResolveTarget, Resolution, Scope};
use crate::scripts;

/// DOM-only click on the best text match among clickable elements.
pub(super) async fn find_and_click(
    session: &Session,
    text: &str,
) -> Result<CommandOutcome, EngineError> {
    let Some(element) = session
        .resolver
        .find_in_dom(&session.tabs, text, Scope::Clickable)
        .await?
    else {
        return Err(EngineError::NotFound(format!(
            "Could not find clickable element with text \"{}\"",
            text
        )));
    };

    let resolution = Resolution::Element(element);
    if session.resolver.click(&session.tabs, &resolution).await? {
        Ok(CommandOutcome::new(format!("Clicked \"{}\"", text)))
    } else {
        Err(EngineError::ActionFailed(format!(
            "Element \"{}\" disappeared before it could be clicked",
            text
        )))
    }
}

/// Click by intent, trying each strategy until one clicks.
///
/// Order: DOM over clickables, vision model, DOM over every element, then a
/// label scan over common clickable markup.
pub(super) async fn smart_click(
    session: &Session,
    intent: &str,
) -> Result<CommandOutcome, EngineError> {
    let resolver = &session.resolver;
    let tabs = &session.tabs;

    let resolution = match resolver.resolve(tabs, &ResolveTarget::intent(intent)).await {
        Ok(resolution) => resolution,
        Err(e) => {
            warn!("Resolution for {:?} failed: {}", intent, e);
            Resolution::NotFound
        }
    };

    if !matches!(resolution, Resolution::NotFound) {
        match resolver.click(tabs, &resolution).await {
            Ok(true) => {
                let via = match &resolution {
                    Resolution::Point(_) => " (vision)",
                    _ => "",
                };
                return Ok(CommandOutcome::new(format!("Clicked \"{}\"{}", intent, via)));
            }
            Ok(false) => debug!("Resolved element for {:?} did not click", intent),
            Err(e) => warn!("Click on resolved {:?} failed: {}", intent, e),
        }
    }

    match resolver.find_in_dom(tabs, intent, Scope::All).await {
        Ok(Some(element)) => {
            let relaxed = Resolution::Element(element);
            match resolver.click(tabs, &relaxed).await {
                Ok(true) => {
                    return Ok(CommandOutcome::new(format!("Clicked \"{}\"", intent)));
                }
                Ok(false) => debug!("Relaxed match for {:?} did not click", intent),
                Err(e) => warn!("Relaxed click on {:?} failed: {}", intent, e),
            }
        }
        Ok(None) => debug!("No relaxed DOM match for {:?}", intent),
        Err(e) => warn!("Relaxed DOM search for {:?} failed: {}", intent, e),
    }

    let clicked = tabs
        .execute_script(scripts::TEXT_CLICK_FALLBACK, &[json!(intent)])
        .await?;
    if clicked.as_bool().unwrap_or(false) {
        info!("Clicked {:?} via label scan", intent);
        return Ok(CommandOutcome::new(format!("Clicked \"{}\"", intent)));
    }

    Err(EngineError::NotFound(format!(
        "Could not find element matching \"{}\"",
        intent
    )))
}
