use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};

/// Result of the speech-to-text stage.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,

    /// Confidence score (0.0 to 1.0), if the service reports one
    #[serde(default)]
    pub confidence: Option<f32>,

    /// Server-side processing time in milliseconds, if reported
    #[serde(default)]
    pub processing_time_ms: Option<u64>,
}

/// Result of the text post-processing stage.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessResponse {
    pub processed_text: String,
}

/// Client boundary for the two-stage remote pipeline.
///
/// `transcribe` and `process` surface every failure; `health_check` is the
/// one deliberate exception and reports all failure modes as `false`.
#[async_trait]
pub trait PipelineClient: Send + Sync {
    /// Stage 1: convert mono audio into raw text.
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscribeResponse>;

    /// Stage 2: refine raw text into a cleaned clinical note.
    async fn process(&self, session_id: &str, text: &str) -> Result<ProcessResponse>;

    /// Fast reachability probe, distinct from the slow payload calls.
    async fn health_check(&self) -> bool;
}

/// HTTP implementation of the pipeline boundary.
///
/// Every call carries the pre-shared key in the `X-Api-Key` header.
/// Payload calls use the generous request timeout; the health check uses
/// its own short one.
pub struct HttpPipelineClient {
    http: reqwest::Client,
    config: PipelineConfig,
}

impl HttpPipelineClient {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "X-Api-Key",
            config
                .api_key
                .parse()
                .map_err(|_| Error::InvalidArgument("API key is not a valid header value".to_string()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Unreachable(e.to_string()))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl PipelineClient for HttpPipelineClient {
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscribeResponse> {
        if !audio_path.exists() {
            return Err(Error::FileNotFound(audio_path.to_path_buf()));
        }

        let audio_bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let part = reqwest::multipart::Part::bytes(audio_bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| Error::BadResponse(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .http
            .post(self.config.transcribe_url())
            .timeout(self.config.request_timeout())
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_request_error(e, "transcribe"))?;

        let result: TranscribeResponse = decode_response(response, "transcribe").await?;

        info!(
            "Transcribed {}: {} characters",
            audio_path.display(),
            result.text.len()
        );

        Ok(result)
    }

    async fn process(&self, session_id: &str, text: &str) -> Result<ProcessResponse> {
        let body = serde_json::json!({
            "id": session_id,
            "text": text,
        });

        let response = self
            .http
            .post(self.config.process_url())
            .timeout(self.config.request_timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| map_request_error(e, "process"))?;

        let result: ProcessResponse = decode_response(response, "process").await?;

        info!(
            "Processed session {}: {} characters",
            session_id,
            result.processed_text.len()
        );

        Ok(result)
    }

    async fn health_check(&self) -> bool {
        let result = self
            .http
            .get(self.config.health_url())
            .timeout(self.config.health_timeout())
            .send()
            .await;

        match result {
            Ok(response) => {
                let available = response.status().is_success();
                info!(
                    "API health check: available={}, status={}",
                    available,
                    response.status()
                );
                available
            }
            Err(e) => {
                warn!("API health check failed: {}", e);
                false
            }
        }
    }
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::BadResponse(format!(
            "{} returned status {}: {}",
            what, status, body
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::BadResponse(format!("{} payload could not be parsed: {}", what, e)))
}

fn map_request_error(e: reqwest::Error, what: &str) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{} call timed out: {}", what, e))
    } else if e.is_connect() {
        Error::Unreachable(format!("{}: {}", what, e))
    } else if e.is_decode() {
        Error::BadResponse(format!("{}: {}", what, e))
    } else {
        Error::Unreachable(format!("{}: {}", what, e))
    }
}
