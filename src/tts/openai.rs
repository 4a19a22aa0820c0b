//! Speech synthesis over the OpenAI-compatible `/audio/speech` endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{RetryPolicy, SynthesisClient, SynthesisError, with_retry};
use crate::config::ConversionConfig;

/// Per-request timeout; long chunks take a while to render.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Error bodies are truncated to this many bytes in messages.
const ERROR_SNIPPET_LEN: usize = 2048;

/// Request body for the speech endpoint.
#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

impl<'a> SpeechRequest<'a> {
    fn new(config: &'a ConversionConfig, input: &'a str) -> Self {
        let speed = (config.speed > 0.0 && config.speed != 1.0).then_some(config.speed);
        let instructions = Some(config.instructions.as_str()).filter(|s| !s.trim().is_empty());
        Self { model: &config.model, input, voice: &config.voice, response_format: config.format.extension(), speed, instructions }
    }
}

/// Error envelope returned by the provider.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// HTTP speech client with bounded retries.
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (e.g., TLS backend failure).
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().context("Failed to create HTTP client")?;
        let endpoint = format!("{}/audio/speech", base_url.trim_end_matches('/'));

        info!("Speech endpoint: {}", endpoint);
        Ok(Self { http, endpoint, retry: RetryPolicy::default() })
    }

    /// One request, no retries.
    async fn request(&self, api_key: &str, body: &SpeechRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        let response = self.http.post(&self.endpoint).bearer_auth(api_key).json(body).send().await.map_err(transport_error)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(SynthesisError::from_status(status.as_u16(), status.canonical_reason().unwrap_or(""), &error_message(&text)));
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SynthesisClient for OpenAiClient {
    async fn synthesize(&self, config: &ConversionConfig, text: &str) -> Result<Vec<u8>, SynthesisError> {
        if config.api_key.is_empty() {
            return Err(SynthesisError::permanent("OPENAI_API_KEY is missing"));
        }

        let body = SpeechRequest::new(config, text);
        let audio = with_retry(&self.retry, |attempt| {
            debug!(attempt, chars = text.len(), "Requesting speech");
            self.request(&config.api_key, &body)
        })
        .await?;

        debug!(bytes = audio.len(), "Speech received");
        Ok(audio)
    }
}

/// Connection failures and timeouts are transient; anything else is not.
fn transport_error(e: reqwest::Error) -> SynthesisError {
    if e.is_timeout() || e.is_connect() || e.is_body() {
        SynthesisError::transient(format!("request failed: {}", e))
    } else {
        SynthesisError::permanent(format!("request failed: {}", e))
    }
}

/// Prefer the provider's structured message, fall back to a trimmed body snippet.
fn error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let body = body.trim();
    let mut end = body.len().min(ERROR_SNIPPET_LEN);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioFormat;

    #[test]
    fn test_request_omits_defaults() {
        let config = ConversionConfig { instructions: "  ".to_string(), ..Default::default() };
        let json = serde_json::to_value(SpeechRequest::new(&config, "Hello.")).unwrap();
        assert_eq!(json["model"], "tts-1-hd-1106");
        assert_eq!(json["input"], "Hello.");
        assert_eq!(json["voice"], "alloy");
        assert_eq!(json["response_format"], "aac");
        assert!(json.get("speed").is_none());
        assert!(json.get("instructions").is_none());
    }

    #[test]
    fn test_request_includes_overrides() {
        let config = ConversionConfig {
            speed: 1.25,
            instructions: "Read slowly.".to_string(),
            format: AudioFormat::Mp3,
            ..Default::default()
        };
        let json = serde_json::to_value(SpeechRequest::new(&config, "Hi")).unwrap();
        assert_eq!(json["speed"], 1.25);
        assert_eq!(json["instructions"], "Read slowly.");
        assert_eq!(json["response_format"], "mp3");
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Invalid API key");
        assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");
        assert_eq!(error_message(&"é".repeat(2000)).len(), ERROR_SNIPPET_LEN);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let client = OpenAiClient::new("http://127.0.0.1:9").unwrap();
        let err = client.synthesize(&ConversionConfig::default(), "text").await.unwrap_err();
        assert!(!err.retryable);
    }
}
