use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::relay::reporter::{ObservabilityService, ObservabilitySession, PredictionRecord};

/// Arize logging API, spoken over its JSON record endpoint
#[derive(Clone)]
pub struct ArizeService {
    http: Client,
    uri: String,
    space_key: String,
    api_key: String,
}

impl ArizeService {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ArizeService {
            http,
            uri: config.arize_uri.clone(),
            space_key: config.space_key.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ObservabilityService for ArizeService {
    async fn open_session(&self) -> Result<Box<dyn ObservabilitySession>> {
        debug!("Opened observability session");
        Ok(Box::new(ArizeSession {
            service: self.clone(),
        }))
    }
}

pub struct ArizeSession {
    service: ArizeService,
}

#[async_trait]
impl ObservabilitySession for ArizeSession {
    #[tracing::instrument(level = "debug", skip_all, fields(prediction_id = %record.prediction_id))]
    async fn log(&mut self, record: &PredictionRecord) -> Result<()> {
        let payload = ArizeRecord::new(&self.service.space_key, record, SystemTime::now())?;
        let res = self
            .service
            .http
            .post(&self.service.uri)
            .header("authorization", &self.service.api_key)
            .header("space", &self.service.space_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to reach observability service")?;
        res.error_for_status()
            .context("Observability service rejected the record")?;
        Ok(())
    }
}

impl Drop for ArizeSession {
    fn drop(&mut self) {
        debug!("Released observability session");
    }
}

#[derive(Serialize, Debug, PartialEq)]
struct ArizeRecord<'a> {
    space_key: &'a str,
    model_id: &'a str,
    prediction_id: &'a str,
    prediction: ArizePrediction<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<ArizeActual>,
}

#[derive(Serialize, Debug, PartialEq)]
struct ArizePrediction<'a> {
    timestamp: Timestamp,
    model_version: &'a str,
    prediction_label: Label,
    features: BTreeMap<&'a str, FeatureValue<'a>>,
}

#[derive(Serialize, Debug, PartialEq)]
struct ArizeActual {
    actual_label: Label,
}

#[derive(Serialize, Debug, PartialEq)]
struct Timestamp {
    seconds: u64,
    nanos: u32,
}

#[derive(Serialize, Debug, PartialEq)]
struct Label {
    numeric: f64,
}

#[derive(Serialize, Debug, PartialEq)]
struct FeatureValue<'a> {
    string: &'a str,
}

impl<'a> ArizeRecord<'a> {
    fn new(space_key: &'a str, record: &'a PredictionRecord, now: SystemTime) -> Result<Self> {
        let since_epoch = now
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the unix epoch")?;
        Ok(ArizeRecord {
            space_key,
            model_id: &record.model_id,
            prediction_id: &record.prediction_id,
            prediction: ArizePrediction {
                timestamp: Timestamp {
                    seconds: since_epoch.as_secs(),
                    nanos: since_epoch.subsec_nanos(),
                },
                model_version: &record.model_version,
                prediction_label: Label {
                    numeric: record.prediction_label,
                },
                features: record
                    .features
                    .iter()
                    .map(|(name, value)| (name.as_str(), FeatureValue { string: value }))
                    .collect(),
            },
            actual: record.actual_label.map(|actual| ArizeActual {
                actual_label: Label { numeric: actual },
            }),
        })
    }
}
