use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_sagemakerruntime::primitives::Blob;
use aws_sdk_sagemakerruntime::Client;

use crate::relay::invoker::InferenceEndpoint;

/// SageMaker runtime client, created once per container and reused across invocations
#[derive(Clone, Debug)]
pub struct SageMakerEndpoint {
    client: Client,
}

impl SageMakerEndpoint {
    pub fn new(client: Client) -> Self {
        SageMakerEndpoint { client }
    }

    pub async fn from_env() -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        SageMakerEndpoint::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl InferenceEndpoint for SageMakerEndpoint {
    #[tracing::instrument(level = "debug", skip(self, body), fields(len = body.len()))]
    async fn invoke(
        &self,
        endpoint_name: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<Vec<u8>> {
        let output = self
            .client
            .invoke_endpoint()
            .endpoint_name(endpoint_name)
            .content_type(content_type)
            .body(Blob::new(body))
            .send()
            .await
            .context("InvokeEndpoint request failed")?;

        let body: Option<&Blob> = output.body().into();
        body.map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| anyhow!("InvokeEndpoint returned no body"))
    }
}
