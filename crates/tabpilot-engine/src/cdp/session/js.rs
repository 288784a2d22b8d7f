//! JavaScript execution operations for CDP page session.

use serde_json::{Value, json};

use crate::cdp::error::CdpError;

use super::core::PageSession;

impl PageSession {
    /// Evaluate JavaScript expression.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                    "userGesture": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            return Err(CdpError::JavaScript(exception_message(exception)));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Call a function declaration in the page with JSON arguments.
    ///
    /// `function` is a JavaScript function expression such as
    /// `(text) => document.title.includes(text)`. Promises are awaited.
    pub async fn call_function(&self, function: &str, args: &[Value]) -> Result<Value, CdpError> {
        let args = serde_json::to_string(args)?;
        self.evaluate(&build_call_expression(function, &args)).await
    }
}

pub(super) fn build_call_expression(function: &str, args_json: &str) -> String {
    format!("({}).apply(null, {})", function.trim(), args_json)
}

/// Prefer the thrown value's description over the generic "Uncaught" text.
pub(super) fn exception_message(exception: &Value) -> String {
    exception["exception"]["description"]
        .as_str()
        .or_else(|| exception["text"].as_str())
        .unwrap_or("Unknown error")
        .to_string()
}
