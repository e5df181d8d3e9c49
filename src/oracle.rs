//! Extraction oracle transport.
//!
//! The [`Oracle`] trait wraps the external language-model service behind a
//! single `generate` operation. The pipeline and query gateway only ever
//! see this trait; [`OpenAiOracle`] is the production implementation and
//! tests substitute scripted oracles.

use async_trait::async_trait;
use base64::Engine;
use std::path::Path;
use std::time::Duration;

use crate::config::OracleConfig;
use crate::error::PipelineError;
use crate::models;

/// An image submitted alongside the extraction instruction.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data_base64: String,
}

impl ImageAttachment {
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path)?;
        Ok(Self {
            media_type: models::image_media_type(path).to_string(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }
}

/// One request to the oracle. `context` carries retrieved index excerpts;
/// `json_output` constrains the response to `application/json`.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub instruction: String,
    pub context: Option<String>,
    pub image: Option<ImageAttachment>,
    pub json_output: bool,
}

impl OracleRequest {
    /// Full prompt text: retrieved context (if any) followed by the
    /// instruction.
    pub fn prompt_text(&self) -> String {
        match &self.context {
            Some(context) => format!(
                "Use only the following document excerpts to answer.\n\n{}\n\n{}",
                context, self.instruction
            ),
            None => self.instruction.clone(),
        }
    }
}

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Submit a request and return the raw response text. Transport
    /// failures surface as [`PipelineError::OracleUnavailable`]; payload
    /// validation happens in [`crate::extract`].
    async fn generate(&self, request: &OracleRequest) -> Result<String, PipelineError>;
}

/// Oracle client for the OpenAI chat-completions endpoint.
///
/// Same retry policy as the embedding client: 429/5xx and network errors
/// retry with exponential backoff, other 4xx fail immediately. Requires
/// the `OPENAI_API_KEY` environment variable.
pub struct OpenAiOracle {
    config: OracleConfig,
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiOracle {
    pub fn new(config: &OracleConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
            api_key,
        })
    }

    fn request_body(&self, request: &OracleRequest) -> serde_json::Value {
        let mut parts = vec![serde_json::json!({
            "type": "text",
            "text": request.prompt_text(),
        })];

        if let Some(image) = &request.image {
            parts.push(serde_json::json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", image.media_type, image.data_base64),
                },
            }));
        }

        let mut body = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": parts }],
        });

        if request.json_output {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn generate(&self, request: &OracleRequest) -> Result<String, PipelineError> {
        let body = self.request_body(request);
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            PipelineError::OracleUnavailable(format!(
                                "failed to read response body: {}",
                                e
                            ))
                        })?;
                        return extract_message_content(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(format!("oracle API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(PipelineError::OracleUnavailable(format!(
                        "oracle API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(PipelineError::OracleUnavailable(
            last_err.unwrap_or_else(|| "oracle call failed after retries".to_string()),
        ))
    }
}

fn extract_message_content(json: &serde_json::Value) -> Result<String, PipelineError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| PipelineError::OracleMalformedResponse {
            reason: "response has no message content".to_string(),
        })
}
