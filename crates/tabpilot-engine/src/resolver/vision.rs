//! Vision-model fallback for locating elements in a screenshot.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabpilot_config::VisionConfig;
use thiserror::Error;
use tracing::debug;

/// Vision backend errors. The resolver absorbs all of these.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Vision request failed: {0}")]
    Network(String),

    #[error("Vision API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid vision response: {0}")]
    InvalidResponse(String),
}

/// Image-plus-prompt model returning free text.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn analyze(&self, image_base64: &str, prompt: &str) -> Result<String, VisionError>;
}

/// Relative viewport position, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

/// Element the vision model believes matches an intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementMatch {
    pub location: Location,
    pub description: String,
    pub confidence: f64,
    pub reasoning: String,
}

impl ElementMatch {
    /// Accepted only when strictly above `threshold`.
    pub fn is_confident(&self, threshold: f64) -> bool {
        self.confidence > threshold
    }
}

/// Vision model served by an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaVision {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: [&'a str; 1],
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaVision {
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VisionError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl VisionBackend for OllamaVision {
    async fn analyze(&self, image_base64: &str, prompt: &str) -> Result<String, VisionError> {
        let url = format!("{}/api/generate", self.endpoint);
        debug!("Vision request: model={}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                images: [image_base64],
                stream: false,
            })
            .send()
            .await
            .map_err(|e| VisionError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VisionError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(VisionError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| VisionError::InvalidResponse(e.to_string()))?;
        Ok(parsed.response)
    }
}

/// Prompt asking the model to describe the element best matching `intent`.
pub fn intent_prompt(intent: &str) -> String {
    format!(
        r#"Find the best element matching this user intention: "{intent}"
Consider the element's text and purpose, its visual appearance and location, and the surrounding context.

Respond with a single JSON object with these fields:
{{"location": {{"x": <0-1 fraction of viewport width>, "y": <0-1 fraction of viewport height>}},
 "description": "<what the element looks like>",
 "confidence": <0-1>,
 "reasoning": "<why this is the best match>"}}"#
    )
}

/// Drop a `data:image/...;base64,` prefix if present.
pub fn strip_data_url(image: &str) -> &str {
    match image.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => image,
    }
}

/// Extract an [`ElementMatch`] from free-form model output.
///
/// Takes the first embedded JSON object with a `location` and `confidence`.
/// Location may be `{x, y}` fractions or words such as "top left";
/// confidence may be a 0-1 fraction or a 0-100 percentage.
pub fn parse_element_match(response: &str) -> Option<ElementMatch> {
    let object = first_json_object(response)?;

    let location = match object.get("location")? {
        Value::String(text) => location_from_words(text),
        Value::Object(coords) => Location {
            x: number(coords.get("x")?)?,
            y: number(coords.get("y")?)?,
        },
        _ => return None,
    };
    let confidence = normalize_confidence(number(object.get("confidence")?)?)?;

    if !(0.0..=1.0).contains(&location.x) || !(0.0..=1.0).contains(&location.y) {
        debug!("Vision location out of range: {:?}", location);
        return None;
    }

    Some(ElementMatch {
        location,
        description: text_field(&object, "description"),
        confidence,
        reasoning: text_field(&object, "reasoning"),
    })
}

fn first_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

/// Numbers, numeric strings, and percentages such as "85%".
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn normalize_confidence(raw: f64) -> Option<f64> {
    let value = if raw > 1.0 { raw / 100.0 } else { raw };
    (0.0..=1.0).contains(&value).then_some(value)
}

fn text_field(object: &serde_json::Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Coarse placement from words like "very top", "far right", "center".
fn location_from_words(text: &str) -> Location {
    let text = text.to_lowercase();
    let mut location = Location { x: 0.5, y: 0.5 };

    if text.contains("top") {
        location.y = if text.contains("very top") { 0.1 } else { 0.25 };
    }
    if text.contains("bottom") {
        location.y = if text.contains("very bottom") { 0.9 } else { 0.75 };
    }
    if text.contains("left") {
        location.x = if text.contains("far left") { 0.1 } else { 0.25 };
    }
    if text.contains("right") {
        location.x = if text.contains("far right") { 0.9 } else { 0.75 };
    }
    if text.contains("center") && !text.contains("top") && !text.contains("bottom") {
        location.y = 0.5;
    }
    if text.contains("center") && !text.contains("left") && !text.contains("right") {
        location.x = 0.5;
    }
    location
}

#[cfg(test)]
#[path = "vision_tests.rs"]
mod tests;
