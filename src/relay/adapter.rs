use anyhow::{anyhow, Context};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};

/// The invocation trigger. Only `body` is of interest, which is either
/// an already decoded JSON object or a pre-serialized string.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub body: Value,
}

impl From<Value> for InboundEvent {
    fn from(mut event: Value) -> Self {
        let body = event
            .as_object_mut()
            .and_then(|fields| fields.remove("body"))
            .unwrap_or(Value::Null);
        InboundEvent { body }
    }
}

impl InboundEvent {
    /// Renders the body as it was received, for failure messages
    pub fn body_text(&self) -> String {
        match &self.body {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Serialized request, ready to be sent to the endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub text: String,
}

impl PredictionRequest {
    /// UTF-8 payload as it goes over the wire
    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

#[tracing::instrument(level = "debug", skip_all)]
pub fn encode(event: &InboundEvent) -> RelayResult<PredictionRequest> {
    let text = match &event.body {
        Value::Object(_) => serde_json::to_string(&event.body)
            .context("Failed to serialize request body")
            .map_err(RelayError::adapter)?,
        Value::String(text) => text.clone(),
        Value::Null => return Err(RelayError::adapter(anyhow!("Event has no body"))),
        other => {
            return Err(RelayError::adapter(anyhow!(
                "Unsupported body of type {}, expected an object or a string",
                json_kind(other)
            )))
        }
    };
    Ok(PredictionRequest { text })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
