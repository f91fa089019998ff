use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Pipeline stage an error originated from
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Adapter,
    Invoker,
    Reporter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Adapter => write!(f, "adapter"),
            Stage::Invoker => write!(f, "invoker"),
            Stage::Reporter => write!(f, "reporter"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to encode request body: {0}")]
    Adapter(String),

    #[error("Failed to obtain prediction: {0}")]
    Invoker(String),

    #[error("Failed to report prediction: {0}")]
    Reporter(String),
}

impl RelayError {
    pub fn stage(&self) -> Stage {
        match self {
            RelayError::Adapter(_) => Stage::Adapter,
            RelayError::Invoker(_) => Stage::Invoker,
            RelayError::Reporter(_) => Stage::Reporter,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            RelayError::Adapter(reason)
            | RelayError::Invoker(reason)
            | RelayError::Reporter(reason) => reason,
        }
    }

    // `{:#}` keeps the whole anyhow context chain on one line
    pub(crate) fn adapter(err: anyhow::Error) -> Self {
        RelayError::Adapter(format!("{:#}", err))
    }

    pub(crate) fn invoker(err: anyhow::Error) -> Self {
        RelayError::Invoker(format!("{:#}", err))
    }

    pub(crate) fn reporter(err: anyhow::Error) -> Self {
        RelayError::Reporter(format!("{:#}", err))
    }
}

pub type RelayResult<T, E = RelayError> = Result<T, E>;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub predict: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct FailureResponse {
    /// `ERROR DATA - ` followed by the original request body
    pub error: String,
    pub stage: Stage,
    pub reason: String,
}

impl FailureResponse {
    pub fn new(err: &RelayError, body: &str) -> Self {
        FailureResponse {
            error: format!("ERROR DATA - {}", body),
            stage: err.stage(),
            reason: err.reason().to_string(),
        }
    }
}

/// What the handler returns to the invoking caller
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum HandlerResponse {
    Success(PredictionResponse),
    Failure(FailureResponse),
}

impl HandlerResponse {
    pub fn prediction(&self) -> Option<f64> {
        match self {
            HandlerResponse::Success(res) => Some(res.predict),
            HandlerResponse::Failure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use serde_json::json;

    use super::*;

    #[test]
    fn success_serializes_to_predict_only() {
        let res = HandlerResponse::Success(PredictionResponse { predict: 0.42 });
        assert_eq!(serde_json::to_value(&res).unwrap(), json!({"predict": 0.42}));
    }

    #[test]
    fn failure_keeps_the_error_data_message() {
        let err = RelayError::invoker(anyhow!("connection reset").context("InvokeEndpoint failed"));
        let res = HandlerResponse::Failure(FailureResponse::new(&err, "{\"data\":[1]}"));

        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            json!({
                "error": "ERROR DATA - {\"data\":[1]}",
                "stage": "invoker",
                "reason": "InvokeEndpoint failed: connection reset",
            })
        );
        assert_eq!(res.prediction(), None);
    }

    #[test]
    fn stage_follows_variant() {
        assert_eq!(RelayError::Adapter("x".into()).stage(), Stage::Adapter);
        assert_eq!(RelayError::Reporter("x".into()).stage(), Stage::Reporter);
        assert_eq!(Stage::Invoker.to_string(), "invoker");
    }
}
