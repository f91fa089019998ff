use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::error::{RelayError, RelayResult};
use crate::relay::adapter::PredictionRequest;

/// A hosted inference endpoint reachable through a single request/response call
#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    async fn invoke(&self, endpoint_name: &str, content_type: &str, body: &[u8])
        -> Result<Vec<u8>>;
}

pub struct PredictionInvoker<E> {
    endpoint: E,
    endpoint_name: String,
    content_type: String,
}

impl<E: InferenceEndpoint> PredictionInvoker<E> {
    pub fn new(endpoint: E, endpoint_name: &str, content_type: &str) -> Self {
        PredictionInvoker {
            endpoint,
            endpoint_name: endpoint_name.to_string(),
            content_type: content_type.to_string(),
        }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Performs exactly one endpoint call, without retries
    #[tracing::instrument(level = "info", skip_all, fields(endpoint = %self.endpoint_name))]
    pub async fn predict(&self, request: &PredictionRequest) -> RelayResult<f64> {
        let raw = self
            .endpoint
            .invoke(&self.endpoint_name, &self.content_type, request.bytes())
            .await
            .with_context(|| format!("Failed to invoke endpoint {}", self.endpoint_name))
            .map_err(RelayError::invoker)?;
        debug!("Endpoint returned {} bytes", raw.len());

        parse_prediction(&raw).map_err(RelayError::invoker)
    }
}

/// Interprets the response body as a single floating point literal
pub fn parse_prediction(raw: &[u8]) -> Result<f64> {
    let text = std::str::from_utf8(raw).context("Endpoint response is not valid UTF-8")?;
    let text = text.trim();
    if text.is_empty() {
        bail!("Endpoint response is empty")
    }
    let value: f64 = text
        .parse()
        .map_err(|_| anyhow!("Endpoint response {:?} is not a number", text))?;
    if !value.is_finite() {
        bail!("Endpoint response {:?} is not a finite number", text)
    }
    Ok(value)
}
