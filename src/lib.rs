//! Forwards inference requests to a hosted prediction endpoint and logs each
//! prediction, together with its input features, to a monitoring service.

pub mod arize;
pub mod config;
pub mod error;
pub mod relay;
pub mod sagemaker;
pub mod telemetry;

pub use config::{Config, ReportFailurePolicy};
pub use error::{FailureResponse, HandlerResponse, PredictionResponse, RelayError, Stage};
pub use relay::adapter::InboundEvent;
pub use relay::Relay;
