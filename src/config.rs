use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

/// Remote pipeline endpoint configuration.
///
/// Base URL, endpoint paths and the pre-shared key are fixed deployment
/// configuration: defaults below, optionally overridden by a config file
/// and `CLINSCRIBE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Base URL of the transcription/processing API
    pub base_url: String,

    /// Static pre-shared key sent in the `X-Api-Key` header on every call
    pub api_key: String,

    /// Path of the speech-to-text endpoint
    pub transcribe_path: String,

    /// Path of the text post-processing endpoint
    pub process_path: String,

    /// Path of the health-check endpoint
    pub health_path: String,

    /// Timeout for transcribe/process calls, in seconds. Generous, to
    /// accommodate large audio payloads.
    pub request_timeout_secs: u64,

    /// Timeout for the health check, in seconds. "Is the API reachable" is
    /// a fast, frequent check, separate from payload processing.
    pub health_timeout_secs: u64,
}

impl PipelineConfig {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("base_url", "https://api.clinscribe.example/v1")?
            .set_default("api_key", "clinscribe-client-access-key")?
            .set_default("transcribe_path", "/transcribe")?
            .set_default("process_path", "/process")?
            .set_default("health_path", "/health")?
            .set_default("request_timeout_secs", 600)?
            .set_default("health_timeout_secs", 5)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CLINSCRIBE"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn transcribe_url(&self) -> String {
        format!("{}{}", self.base_url, self.transcribe_path)
    }

    pub fn process_url(&self) -> String {
        format!("{}{}", self.base_url, self.process_path)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url, self.health_path)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.clinscribe.example/v1".to_string(),
            api_key: "clinscribe-client-access-key".to_string(),
            transcribe_path: "/transcribe".to_string(),
            process_path: "/process".to_string(),
            health_path: "/health".to_string(),
            request_timeout_secs: 600,
            health_timeout_secs: 5,
        }
    }
}
