//! Element resolution: DOM matching first, vision model second.

mod matching;
mod vision;

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::scripts;
use crate::tab::TabController;

pub use self::matching::{Candidate, MatchTier, best_match};
pub use self::vision::{
    ElementMatch, Location, OllamaVision, VisionBackend, VisionError, intent_prompt,
    parse_element_match, strip_data_url,
};

/// Which elements the DOM pass considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Links, buttons, role=button and submit controls.
    Clickable,
    /// Any visible element carrying text or a label.
    All,
}

impl Scope {
    fn as_str(self) -> &'static str {
        match self {
            Scope::Clickable => "clickable",
            Scope::All => "all",
        }
    }
}

/// What to look for: literal text, a natural-language intent, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveTarget {
    pub text: Option<String>,
    pub intent: Option<String>,
}

impl ResolveTarget {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            intent: None,
        }
    }

    /// Intent that doubles as literal text for the DOM pass.
    pub fn intent(intent: impl Into<String>) -> Self {
        let intent = intent.into();
        Self {
            text: Some(intent.clone()),
            intent: Some(intent),
        }
    }
}

/// DOM candidate chosen by tiered matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub candidate: Candidate,
    pub tier: MatchTier,
}

/// Outcome of resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Element(ResolvedElement),
    Point(ElementMatch),
    NotFound,
}

/// Finds and clicks page elements on the controlled tab.
pub struct ElementResolver {
    vision: Option<Arc<dyn VisionBackend>>,
    confidence_threshold: f64,
    click_settle_ms: u64,
}

impl ElementResolver {
    pub fn new(
        vision: Option<Arc<dyn VisionBackend>>,
        confidence_threshold: f64,
        click_settle_ms: u64,
    ) -> Self {
        Self {
            vision,
            confidence_threshold,
            click_settle_ms,
        }
    }

    /// DOM matching on `text`, then the vision model on `intent`.
    ///
    /// Vision problems of any kind degrade to [`Resolution::NotFound`].
    pub async fn resolve(
        &self,
        tabs: &TabController,
        target: &ResolveTarget,
    ) -> Result<Resolution, EngineError> {
        if let Some(text) = target.text.as_deref() {
            if let Some(element) = self.find_in_dom(tabs, text, Scope::Clickable).await? {
                debug!("Resolved {:?} in DOM ({:?})", text, element.tier);
                return Ok(Resolution::Element(element));
            }
        }

        if let Some(intent) = target.intent.as_deref() {
            if let Some(found) = self.locate_visually(tabs, intent).await {
                if found.is_confident(self.confidence_threshold) {
                    info!(
                        "Vision located {:?} at ({:.2}, {:.2}), confidence {:.2}",
                        intent, found.location.x, found.location.y, found.confidence
                    );
                    return Ok(Resolution::Point(found));
                }
                debug!(
                    "Vision match for {:?} below threshold ({:.2} <= {:.2})",
                    intent, found.confidence, self.confidence_threshold
                );
            }
        }

        Ok(Resolution::NotFound)
    }

    /// Collect candidates in `scope` and pick the best match for `text`.
    pub async fn find_in_dom(
        &self,
        tabs: &TabController,
        text: &str,
        scope: Scope,
    ) -> Result<Option<ResolvedElement>, EngineError> {
        let raw = tabs
            .execute_script(scripts::COLLECT_CANDIDATES, &[json!(scope.as_str())])
            .await?;
        let candidates: Vec<Candidate> = serde_json::from_value(raw)
            .map_err(|e| EngineError::Script(format!("unexpected candidate list: {}", e)))?;

        Ok(best_match(&candidates, text).map(|(candidate, tier)| ResolvedElement {
            candidate: candidate.clone(),
            tier,
        }))
    }

    /// Click a resolved element. Returns `false` when the page reports no click.
    pub async fn click(
        &self,
        tabs: &TabController,
        resolution: &Resolution,
    ) -> Result<bool, EngineError> {
        let result = match resolution {
            Resolution::Element(element) => {
                tabs.execute_script(
                    scripts::CLICK_CANDIDATE,
                    &[json!(element.candidate.index), json!(self.click_settle_ms)],
                )
                .await?
            }
            Resolution::Point(found) => {
                tabs.execute_script(
                    scripts::CLICK_AT_POINT,
                    &[json!(found.location.x), json!(found.location.y)],
                )
                .await?
            }
            Resolution::NotFound => return Ok(false),
        };
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn locate_visually(&self, tabs: &TabController, intent: &str) -> Option<ElementMatch> {
        let vision = self.vision.as_ref()?;
        let Some(screenshot) = tabs.capture_screenshot().await else {
            debug!("No screenshot for vision fallback");
            return None;
        };

        match vision
            .analyze(strip_data_url(&screenshot), &intent_prompt(intent))
            .await
        {
            Ok(text) => {
                let parsed = parse_element_match(&text);
                if parsed.is_none() {
                    debug!("Vision response had no usable element match");
                }
                parsed
            }
            Err(e) => {
                warn!("Vision fallback failed: {}", e);
                None
            }
        }
    }
}
