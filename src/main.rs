use std::sync::Arc;

use clap::Parser;
use clap_serde_derive::ClapSerde;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;

use model_relay::arize::ArizeService;
use model_relay::config::{Config, DEFAULT_CONFIG_FILE};
use model_relay::sagemaker::SageMakerEndpoint;
use model_relay::telemetry::init_tracing;
use model_relay::{HandlerResponse, InboundEvent, Relay};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "MODEL_RELAY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();
    let config = Config::load(&args.config_file, args.opt_config)?;
    init_tracing(config.log_json);
    info!(
        endpoint = %config.endpoint_name,
        model_id = %config.model_id,
        model_version = %config.model_version,
        "Starting {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    // Clients are built once per container and shared by every invocation
    let endpoint = SageMakerEndpoint::from_env().await;
    let service = ArizeService::new(&config)?;
    let relay = Arc::new(Relay::from_config(&config, endpoint, service));

    run(service_fn(move |event: LambdaEvent<Value>| {
        let relay = relay.clone();
        async move {
            let response: HandlerResponse = relay.handle(InboundEvent::from(event.payload)).await;
            Ok::<_, Error>(response)
        }
    }))
    .await
}
