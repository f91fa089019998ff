use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};

/// Feature name to stringified value, as logged next to a prediction
pub type FeatureLabels = BTreeMap<String, String>;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionRecord {
    pub prediction_id: String,
    pub model_id: String,
    pub model_version: String,
    pub prediction_label: f64,
    pub features: FeatureLabels,
    /// Ground truth is never known at prediction time
    pub actual_label: Option<f64>,
}

/// Entry point to the monitoring backend. A session is opened per invocation.
#[async_trait]
pub trait ObservabilityService: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn ObservabilitySession>>;
}

/// A short lived handle to the monitoring backend, released when dropped
#[async_trait]
pub trait ObservabilitySession: Send {
    async fn log(&mut self, record: &PredictionRecord) -> Result<()>;
}

pub struct ObservabilityReporter<O> {
    service: O,
    model_id: String,
    model_version: String,
    feature_names: Vec<String>,
}

impl<O: ObservabilityService> ObservabilityReporter<O> {
    pub fn new(service: O, model_id: &str, model_version: &str, feature_names: &[String]) -> Self {
        ObservabilityReporter {
            service,
            model_id: model_id.to_string(),
            model_version: model_version.to_string(),
            feature_names: feature_names.to_vec(),
        }
    }

    pub fn service(&self) -> &O {
        &self.service
    }

    /// Builds the record for `prediction` from the serialized request `text`
    pub fn record(
        &self,
        prediction_id: &str,
        text: &str,
        prediction: f64,
    ) -> Result<PredictionRecord> {
        let features = feature_labels(&self.feature_names, text)?;
        Ok(PredictionRecord {
            prediction_id: prediction_id.to_string(),
            model_id: self.model_id.clone(),
            model_version: self.model_version.clone(),
            prediction_label: prediction,
            features,
            actual_label: None,
        })
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn report(
        &self,
        prediction_id: &str,
        text: &str,
        prediction: f64,
    ) -> RelayResult<PredictionRecord> {
        let record = self
            .record(prediction_id, text, prediction)
            .map_err(RelayError::reporter)?;

        let mut session = self
            .service
            .open_session()
            .await
            .context("Failed to open observability session")
            .map_err(RelayError::reporter)?;
        session
            .log(&record)
            .await
            .context("Failed to log prediction")
            .map_err(RelayError::reporter)?;
        drop(session);

        info!(
            prediction = record.prediction_label,
            features = ?record.features,
            "Logged prediction"
        );
        Ok(record)
    }
}

/// Re-reads the `data` array from `text` and pairs it positionally with `names`.
/// Values beyond the last name are ignored.
pub fn feature_labels(names: &[String], text: &str) -> Result<FeatureLabels> {
    let body: Value = serde_json::from_str(text).context("Request body is not valid JSON")?;
    let data = body
        .get("data")
        .ok_or_else(|| anyhow!("Request body has no data field"))?
        .as_array()
        .ok_or_else(|| anyhow!("Request data is not an array"))?;
    if data.len() < names.len() {
        bail!(
            "Request data has {} values but {} features are expected",
            data.len(),
            names.len()
        )
    }

    Ok(names
        .iter()
        .zip(data)
        .map(|(name, value)| (name.clone(), label(value)))
        .collect())
}

fn label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Timestamp prefix down to the second, followed by a random UUID
pub fn prediction_id(now: DateTime<Utc>) -> String {
    format!("{}{}", now.format("%Y%m-%d%H-%M%S-"), Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;
    use crate::config::default_feature_names;

    const BODY: &str =
        r#"{"data":["M",0.455,0.365,0.095,0.514,0.2245,0.101,0.15]}"#;

    #[test]
    fn maps_data_positionally_onto_feature_names() {
        let labels = feature_labels(&default_feature_names(), BODY).unwrap();

        let expected: FeatureLabels = [
            ("sex", "M"),
            ("length", "0.455"),
            ("diameter", "0.365"),
            ("height", "0.095"),
            ("whole_weight", "0.514"),
            ("shucked_weight", "0.2245"),
            ("viscera_weight", "0.101"),
            ("shell_weight", "0.15"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn stringifies_non_string_values() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let labels = feature_labels(&names, r#"{"data":[1,true,null,"extra"]}"#).unwrap();

        assert_eq!(labels["a"], "1");
        assert_eq!(labels["b"], "true");
        assert_eq!(labels["c"], "null");
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn short_data_is_rejected() {
        let err = feature_labels(&default_feature_names(), r#"{"data":["M",0.455]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("2 values but 8"));
    }

    #[test]
    fn missing_or_malformed_data_is_rejected() {
        let names = default_feature_names();
        assert!(feature_labels(&names, r#"{"rows":[]}"#).is_err());
        assert!(feature_labels(&names, r#"{"data":"M,0.4"}"#).is_err());
        assert!(feature_labels(&names, "M,0.455,0.365").is_err());
    }

    #[test]
    fn prediction_id_has_timestamp_prefix() {
        let now = Utc.with_ymd_and_hms(2020, 4, 17, 16, 5, 9).unwrap();
        let id = prediction_id(now);

        assert!(id.starts_with("202004-1716-0509-"), "{}", id);
        let suffix = &id["202004-1716-0509-".len()..];
        assert!(Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn prediction_ids_are_unique_within_the_same_second() {
        let now = Utc::now();
        let ids: HashSet<String> = (0..10_000).map(|_| prediction_id(now)).collect();
        assert_eq!(ids.len(), 10_000);
    }
}
