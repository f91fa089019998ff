use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use clap_serde_derive::ClapSerde;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "ModelRelay.toml";

/// What the pipeline does when the prediction was computed but could not be reported
#[derive(ValueEnum, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFailurePolicy {
    /// Return the prediction anyway and record the reporting failure in the logs
    #[default]
    Degrade,
    /// Fail the invocation with a reporter-stage failure response
    Fail,
}

#[derive(ClapSerde, Clone)]
pub struct Config {
    /// Name of the hosted inference endpoint
    #[default("inference-pipeline-ep-2020-04-17-16-00-2511".to_string())]
    #[arg(long, env = "ENDPOINT_NAME")]
    pub endpoint_name: String,

    /// Content type the endpoint expects for the request body
    #[default("application/json".to_string())]
    #[arg(long, env = "ENDPOINT_CONTENT_TYPE")]
    pub content_type: String,

    /// Model identifier attached to every logged prediction
    #[default("sage-maker-lambda".to_string())]
    #[arg(long, env = "MODEL_ID")]
    pub model_id: String,

    /// Model version attached to every logged prediction
    #[default("v0.1".to_string())]
    #[arg(long, env = "MODEL_VERSION")]
    pub model_version: String,

    /// Space key of the observability service
    #[default("space_key".to_string())]
    #[arg(long, env = "ARIZE_SPACE_KEY")]
    pub space_key: String,

    /// API key of the observability service
    #[arg(long, env = "ARIZE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Logging endpoint of the observability service
    #[default("https://api.arize.com/v1/log".to_string())]
    #[arg(long, env = "ARIZE_URI")]
    pub arize_uri: String,

    /// Ordered feature names, positionally matching the `data` array of a request
    #[default(default_feature_names())]
    #[arg(long, env = "FEATURE_NAMES", value_delimiter = ',')]
    pub feature_names: Vec<String>,

    /// Behaviour when a computed prediction cannot be reported
    #[default(ReportFailurePolicy::Degrade)]
    #[arg(long, env = "REPORT_FAILURE", value_enum)]
    pub report_failure: ReportFailurePolicy,

    /// Emit log lines as JSON
    #[default(false)]
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

pub fn default_feature_names() -> Vec<String> {
    [
        "sex",
        "length",
        "diameter",
        "height",
        "whole_weight",
        "shucked_weight",
        "viscera_weight",
        "shell_weight",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

impl Config {
    /// Reads a (possibly partial) TOML file on top of the defaults
    pub fn from_toml(path: &str) -> Result<Self> {
        let str = std::fs::read_to_string(path)?;
        let opt: <Config as ClapSerde>::Opt = toml::from_str(&str)?;
        Ok(Config::default().merge(opt))
    }

    /// Same as [`Config::resolve`], but also rejects configurations the relay cannot run with
    pub fn load(path: &str, cli: <Config as ClapSerde>::Opt) -> Result<Self> {
        let config = Config::resolve(path, cli)?;
        config.validate()?;
        Ok(config)
    }

    /// Layers file values, then CLI and environment values, over the defaults.
    /// A missing file is only tolerated at the default location.
    pub fn resolve(path: &str, cli: <Config as ClapSerde>::Opt) -> Result<Self> {
        let config = if Path::new(path).exists() {
            Config::from_toml(path)
                .with_context(|| format!("Failed to read configuration file {}", path))?
                .merge(cli)
        } else if path == DEFAULT_CONFIG_FILE {
            Config::default().merge(cli)
        } else {
            bail!("Configuration file {} does not exist", path)
        };
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("No observability API key configured, set ARIZE_API_KEY")
        }
        if self.endpoint_name.trim().is_empty() {
            bail!("No inference endpoint name configured")
        }
        if self.feature_names.is_empty() {
            bail!("At least one feature name is required")
        }
        let mut seen = HashSet::new();
        if let Some(name) = self.feature_names.iter().find(|name| !seen.insert(*name)) {
            bail!("Feature name {} is listed more than once", name)
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("endpoint_name", &self.endpoint_name)
            .field("content_type", &self.content_type)
            .field("model_id", &self.model_id)
            .field("model_version", &self.model_version)
            .field("space_key", &self.space_key)
            .field("api_key", &"<redacted>")
            .field("arize_uri", &self.arize_uri)
            .field("feature_names", &self.feature_names)
            .field("report_failure", &self.report_failure)
            .field("log_json", &self.log_json)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_toml(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!(
            "model_relay_{}_{}.toml",
            name,
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn defaults_match_the_deployed_constants() {
        let config = Config::default();
        assert_eq!(config.endpoint_name, "inference-pipeline-ep-2020-04-17-16-00-2511");
        assert_eq!(config.content_type, "application/json");
        assert_eq!(config.model_id, "sage-maker-lambda");
        assert_eq!(config.model_version, "v0.1");
        assert_eq!(config.feature_names.len(), 8);
        assert_eq!(config.feature_names[0], "sex");
        assert_eq!(config.feature_names[7], "shell_weight");
        assert_eq!(config.report_failure, ReportFailurePolicy::Degrade);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("ARIZE_API_KEY"));
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let path = write_toml(
            "partial",
            "api_key = \"secret\"\nmodel_version = \"v0.2\"\nreport_failure = \"fail\"\n",
        );
        let config = Config::from_toml(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.model_version, "v0.2");
        assert_eq!(config.report_failure, ReportFailurePolicy::Fail);
        assert_eq!(config.model_id, "sage-maker-lambda");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let opt: <Config as ClapSerde>::Opt = toml::from_str("").unwrap();
        let err = Config::load("/nonexistent/model_relay.toml", opt).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn missing_file_at_default_location_yields_defaults() {
        assert!(!Path::new(DEFAULT_CONFIG_FILE).exists());
        let opt: <Config as ClapSerde>::Opt = toml::from_str("").unwrap();
        let config = Config::resolve(DEFAULT_CONFIG_FILE, opt).unwrap();

        assert_eq!(config.endpoint_name, "inference-pipeline-ep-2020-04-17-16-00-2511");
        assert_eq!(config.model_version, "v0.1");
        assert_eq!(config.feature_names, default_feature_names());
    }

    #[test]
    fn cli_values_override_file_values() {
        let path = write_toml(
            "layered",
            "model_version = \"v0.2\"\nmodel_id = \"abalone\"\n",
        );
        let cli: <Config as ClapSerde>::Opt =
            toml::from_str("model_version = \"v0.3\"").unwrap();
        let config = Config::resolve(&path, cli).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.model_version, "v0.3");
        assert_eq!(config.model_id, "abalone");
        assert_eq!(config.content_type, "application/json");
    }

    #[test]
    fn duplicate_feature_names_are_rejected() {
        let mut config = Config::default();
        config.api_key = "key".to_string();
        config.feature_names.push("length".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("length"));
    }

    #[test]
    fn debug_output_redacts_the_api_key() {
        let mut config = Config::default();
        config.api_key = "very-secret".to_string();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
