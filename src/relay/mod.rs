use chrono::Utc;
use tracing::field::Empty;
use tracing::{error, info, warn, Instrument, Span};

use crate::config::{Config, ReportFailurePolicy};
use crate::error::{FailureResponse, HandlerResponse, PredictionResponse};
use crate::relay::adapter::InboundEvent;
use crate::relay::invoker::{InferenceEndpoint, PredictionInvoker};
use crate::relay::reporter::{prediction_id, ObservabilityReporter, ObservabilityService};

pub mod adapter;
pub mod invoker;
pub mod reporter;

/// Request adapter, prediction invoker and observability reporter, run in sequence
pub struct Relay<E, O> {
    invoker: PredictionInvoker<E>,
    reporter: ObservabilityReporter<O>,
    policy: ReportFailurePolicy,
}

impl<E, O> Relay<E, O>
where
    E: InferenceEndpoint,
    O: ObservabilityService,
{
    pub fn new(
        invoker: PredictionInvoker<E>,
        reporter: ObservabilityReporter<O>,
        policy: ReportFailurePolicy,
    ) -> Self {
        Relay {
            invoker,
            reporter,
            policy,
        }
    }

    pub fn from_config(config: &Config, endpoint: E, service: O) -> Self {
        Relay::new(
            PredictionInvoker::new(endpoint, &config.endpoint_name, &config.content_type),
            ObservabilityReporter::new(
                service,
                &config.model_id,
                &config.model_version,
                &config.feature_names,
            ),
            config.report_failure,
        )
    }

    pub fn reporter(&self) -> &ObservabilityReporter<O> {
        &self.reporter
    }

    pub async fn handle(&self, event: InboundEvent) -> HandlerResponse {
        self.run(event)
            .instrument(tracing::info_span!("invocation", prediction_id = Empty))
            .await
    }

    async fn run(&self, event: InboundEvent) -> HandlerResponse {
        let request = match adapter::encode(&event) {
            Ok(request) => request,
            Err(err) => {
                warn!("{}", err);
                return HandlerResponse::Failure(FailureResponse::new(&err, &event.body_text()));
            }
        };

        let prediction = match self.invoker.predict(&request).await {
            Ok(prediction) => prediction,
            Err(err) => {
                warn!("{}", err);
                return HandlerResponse::Failure(FailureResponse::new(&err, &event.body_text()));
            }
        };
        let id = prediction_id(Utc::now());
        Span::current().record("prediction_id", id.as_str());
        info!(prediction, "Received prediction");

        if let Err(err) = self.reporter.report(&id, &request.text, prediction).await {
            error!("{}", err);
            if self.policy == ReportFailurePolicy::Fail {
                return HandlerResponse::Failure(FailureResponse::new(&err, &event.body_text()));
            }
        }

        HandlerResponse::Success(PredictionResponse {
            predict: prediction,
        })
    }
}
