//! GeminiGateway - Direct REST API implementation of the completion gateway.
//!
//! This gateway calls the Gemini REST API directly without CLI dependency.
//! The API key is provided by the caller or read from the environment.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use plumbline_core::PlumblineError;
use plumbline_core::gateway::{CompletionGateway, GatewayError, Turn, TurnRole};
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Completion gateway implementation that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiGateway {
    client: Client,
    api_key: String,
    model: String,
    system_instruction: Option<String>,
}

impl GeminiGateway {
    /// Creates a new gateway with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            system_instruction: None,
        }
    }

    /// Reads the API key from the `GEMINI_API_KEY` environment variable.
    ///
    /// Model name defaults to `gemini-2.5-flash`.
    pub fn try_from_env() -> plumbline_core::Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| PlumblineError::config(format!("{API_KEY_ENV} is not set")))?;
        Ok(Self::new(api_key, DEFAULT_GEMINI_MODEL))
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Adds a system instruction that will be sent alongside every request.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    async fn send_request(&self, body: &GenerateContentRequest) -> Result<String, GatewayError> {
        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            BASE_URL,
            model = self.model,
            api_key = self.api_key
        );

        tracing::debug!("[GeminiGateway] POST {}:generateContent", self.model);

        let response = self.client.post(url).json(body).send().await.map_err(|err| {
            if err.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Network {
                    message: err.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|err| GatewayError::Malformed {
                message: format!("Failed to parse Gemini response: {err}"),
            })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl CompletionGateway for GeminiGateway {
    async fn complete(&self, turns: &[Turn]) -> Result<String, GatewayError> {
        let contents = build_contents(turns)?;

        let system_instruction = self.system_instruction.as_ref().map(|text| Content {
            role: "system".to_string(),
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
        });

        let request = GenerateContentRequest {
            contents,
            system_instruction,
        };
        self.send_request(&request).await
    }
}

fn build_contents(turns: &[Turn]) -> Result<Vec<Content>, GatewayError> {
    if turns.is_empty() {
        return Err(GatewayError::InvalidRequest {
            message: "completion request must contain at least one turn".into(),
        });
    }

    let mut contents = Vec::with_capacity(turns.len());
    for turn in turns {
        let mut parts = Vec::new();
        for text in &turn.text_parts {
            if !text.trim().is_empty() {
                parts.push(Part::Text { text: text.clone() });
            }
        }
        for attachment in &turn.attachments {
            parts.push(Part::InlineData {
                inline_data: InlineDataPayload {
                    mime_type: attachment.mime_type.clone(),
                    data: BASE64_STANDARD.encode(&attachment.data),
                },
            });
        }

        if parts.is_empty() {
            return Err(GatewayError::InvalidRequest {
                message: "turn must include text or attachments".into(),
            });
        }

        contents.push(Content {
            role: wire_role(turn.role).to_string(),
            parts,
        });
    }

    Ok(contents)
}

fn wire_role(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Model => "model",
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[allow(dead_code)]
    code: Option<i32>,
    message: Option<String>,
    status: Option<String>,
}

fn extract_text_response(response: GenerateContentResponse) -> Result<String, GatewayError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(GatewayError::ContentPolicy {
            message: reason.to_string(),
        });
    }

    response
        .candidates
        .and_then(|mut candidates| candidates.pop())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .ok_or_else(|| GatewayError::Malformed {
            message: "Gemini API returned no text in the response candidates".into(),
        })
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> GatewayError {
    let message = serde_json::from_str::<ErrorWrapper>(&body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.clone());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.clone());

    if status == StatusCode::TOO_MANY_REQUESTS {
        return GatewayError::RateLimited { retry_after };
    }

    let is_retryable = matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    GatewayError::Http {
        status: status.as_u16(),
        message,
        retryable: is_retryable,
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // Retry-After HTTP-date parsing is omitted for simplicity
    None
}
