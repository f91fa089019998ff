use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use clap_serde_derive::ClapSerde;
use serde_json::Value;
use tokio::io::AsyncReadExt;

use model_relay::arize::ArizeService;
use model_relay::config::{Config, DEFAULT_CONFIG_FILE};
use model_relay::relay::adapter::{self, InboundEvent};
use model_relay::relay::reporter::{feature_labels, prediction_id};
use model_relay::sagemaker::SageMakerEndpoint;
use model_relay::telemetry::init_tracing;
use model_relay::Relay;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "MODEL_RELAY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    #[command(subcommand)]
    cmd: Commands,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one invocation against the configured endpoint and observability service
    Invoke {
        /// File containing the event, `-` reads from stdin
        #[clap(short, long, default_value = "-")]
        event: String,
    },
    /// Print the feature labels that would be logged for an event
    Features {
        /// File containing the event, `-` reads from stdin
        #[clap(short, long, default_value = "-")]
        event: String,
    },
    /// Generate prediction identifiers
    PredictionId {
        /// Number of identifiers to generate
        #[clap(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
}

async fn read_event(path: &str) -> Result<InboundEvent> {
    let mut raw = String::new();
    if path == "-" {
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("Failed to read event from stdin")?;
    } else {
        raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file {}", path))?;
    }
    let event: Value = serde_json::from_str(&raw).context("Event is not valid JSON")?;
    Ok(InboundEvent::from(event))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.cmd {
        Commands::Invoke { event } => {
            let config = Config::load(&args.config_file, args.opt_config)?;
            init_tracing(config.log_json);
            let event = read_event(&event).await?;

            let relay = Relay::from_config(
                &config,
                SageMakerEndpoint::from_env().await,
                ArizeService::new(&config)?,
            );
            let response = relay.handle(event).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Features { event } => {
            let config = Config::resolve(&args.config_file, args.opt_config)?;
            let event = read_event(&event).await?;

            let request = adapter::encode(&event)?;
            let labels = feature_labels(&config.feature_names, &request.text)?;
            for name in &config.feature_names {
                println!("{}: {}", name, labels[name]);
            }
        }
        Commands::PredictionId { count } => {
            for _ in 0..count {
                println!("{}", prediction_id(Utc::now()));
            }
        }
    }
    Ok(())
}
