use crate::llm::config::LlmConfig;
use crate::llm::retry::{Classify, ErrorKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in LLM service
#[derive(Debug, Error)]
pub enum LlmServiceError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Non-success answer from the upstream API
    #[error("API error ({}): {message}", describe_status(.status, .code))]
    ApiError {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Malformed structured response: {0}")]
    MalformedResponse(String),
}

impl LlmServiceError {
    pub fn api(status: Option<u16>, code: Option<&str>, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }
}

fn describe_status(status: &Option<u16>, code: &Option<String>) -> String {
    match (status, code) {
        (Some(status), Some(code)) => format!("status {}, {}", status, code),
        (Some(status), None) => format!("status {}", status),
        (None, Some(code)) => code.clone(),
        (None, None) => "no status".to_string(),
    }
}

const RETRYABLE_MARKERS: [&str; 3] = ["429", "RESOURCE_EXHAUSTED", "quota"];

impl Classify for LlmServiceError {
    /// Rate limiting and quota exhaustion are retryable; everything else is fatal.
    ///
    /// Structured fields are checked first. The rendered message is only
    /// scanned for the upstream's rate-limit markers as a fallback, for errors
    /// whose shape does not carry a status.
    fn classify(&self) -> ErrorKind {
        if let LlmServiceError::ApiError { status, code, .. } = self {
            if *status == Some(429) {
                return ErrorKind::Retryable;
            }
            if code.as_deref().is_some_and(|c| c.contains("RESOURCE_EXHAUSTED")) {
                return ErrorKind::Retryable;
            }
        }

        let rendered = self.to_string();
        if RETRYABLE_MARKERS.iter().any(|m| rendered.contains(m)) {
            ErrorKind::Retryable
        } else {
            ErrorKind::Fatal
        }
    }
}

/// Generation options sent alongside the prompt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    pub system_instruction: String,
    pub temperature: Option<f32>,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<Value>,
}

/// One-shot generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub contents: String,
    pub config: GenerationConfig,
}

impl GenerateRequest {
    pub fn new(model: &str, system_instruction: &str, contents: String) -> Self {
        Self {
            model: model.to_string(),
            contents,
            config: GenerationConfig {
                system_instruction: system_instruction.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Constrain the answer to a JSON document matching `schema`
    pub fn with_json_schema(mut self, schema: Value) -> Self {
        self.config.response_mime_type = Some("application/json".to_string());
        self.config.response_schema = Some(schema);
        self
    }

    /// Body for the `generateContent` endpoint
    pub fn to_body(&self) -> Value {
        let mut generation_config = serde_json::Map::new();
        if let Some(temperature) = self.config.temperature {
            generation_config.insert("temperature".to_string(), temperature.into());
        }
        if let Some(mime) = &self.config.response_mime_type {
            generation_config.insert("responseMimeType".to_string(), mime.clone().into());
        }
        if let Some(schema) = &self.config.response_schema {
            generation_config.insert("responseSchema".to_string(), schema.clone());
        }

        serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": self.contents } ] }
            ],
            "systemInstruction": {
                "parts": [ { "text": self.config.system_instruction } ]
            },
            "generationConfig": generation_config,
        })
    }
}

/// A remote model that turns a request into response text
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<String, LlmServiceError>;
}

/// Client for the Gemini `generateContent` REST endpoint
pub struct GeminiClient {
    client: Client,
    api_base: String,
    timeout: Duration,
    debug: bool,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmServiceError> {
        let client = Client::builder()
            .build()
            .map_err(|e| LlmServiceError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            debug: config.debug,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<String, LlmServiceError> {
        if self.debug {
            tracing::debug!(
                "Sending request to Gemini: model={}, structured={}",
                request.model,
                request.config.response_schema.is_some()
            );
        }

        let send = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", api_key)
            .json(&request.to_body())
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| LlmServiceError::Timeout)?
            .map_err(|e| LlmServiceError::HttpError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmServiceError::HttpError(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &body));
        }

        let json: Value =
            serde_json::from_str(&body).map_err(|e| LlmServiceError::ParseError(e.to_string()))?;
        let text = extract_text(&json)?;

        if self.debug {
            tracing::debug!("Received response: {} chars", text.len());
        }

        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Decode an `{"error": {"code", "message", "status"}}` body, keeping the raw
/// body as the message when it has another shape.
pub fn parse_error_body(status: u16, body: &str) -> LlmServiceError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => LlmServiceError::api(
            Some(status),
            envelope.error.status.as_deref(),
            envelope.error.message,
        ),
        Err(_) => LlmServiceError::api(Some(status), None, body.trim()),
    }
}

/// Concatenate the text parts of the first candidate
pub fn extract_text(response: &Value) -> Result<String, LlmServiceError> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| LlmServiceError::ParseError("No response content".to_string()))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(LlmServiceError::ParseError("Empty response text".to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_429_is_retryable() {
        let err = LlmServiceError::api(Some(429), None, "Too Many Requests");
        assert_eq!(err.classify(), ErrorKind::Retryable);
    }

    #[test]
    fn test_resource_exhausted_code_is_retryable() {
        let err = LlmServiceError::api(None, Some("RESOURCE_EXHAUSTED"), "try later");
        assert_eq!(err.classify(), ErrorKind::Retryable);
    }

    #[test]
    fn test_quota_message_is_retryable() {
        let err = LlmServiceError::api(Some(403), None, "You exceeded your current quota");
        assert_eq!(err.classify(), ErrorKind::Retryable);

        let err = LlmServiceError::HttpError("upstream said 429".to_string());
        assert_eq!(err.classify(), ErrorKind::Retryable);
    }

    #[test]
    fn test_quota_match_is_case_sensitive() {
        let err = LlmServiceError::api(Some(400), None, "QUOTA settings invalid");
        assert_eq!(err.classify(), ErrorKind::Fatal);
    }

    #[test]
    fn test_other_errors_are_fatal() {
        assert_eq!(
            LlmServiceError::api(Some(500), Some("INTERNAL"), "boom").classify(),
            ErrorKind::Fatal
        );
        assert_eq!(
            LlmServiceError::HttpError("connection refused".to_string()).classify(),
            ErrorKind::Fatal
        );
        assert_eq!(LlmServiceError::Timeout.classify(), ErrorKind::Fatal);
        assert_eq!(
            LlmServiceError::MalformedResponse("not json".to_string()).classify(),
            ErrorKind::Fatal
        );
    }

    #[test]
    fn test_parse_error_body_envelope() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        match parse_error_body(429, body) {
            LlmServiceError::ApiError { status, code, message } => {
                assert_eq!(status, Some(429));
                assert_eq!(code.as_deref(), Some("RESOURCE_EXHAUSTED"));
                assert_eq!(message, "Resource has been exhausted");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_body_plain_text() {
        let err = parse_error_body(502, "Bad Gateway\n");
        assert!(matches!(
            err,
            LlmServiceError::ApiError { status: Some(502), code: None, ref message } if message == "Bad Gateway"
        ));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response = json!({
            "candidates": [
                { "content": { "parts": [ { "text": "Hello, " }, { "text": "world" } ] } }
            ]
        });
        assert_eq!(extract_text(&response).unwrap(), "Hello, world");
    }

    #[test]
    fn test_extract_text_missing_candidates() {
        let result = extract_text(&json!({ "candidates": [] }));
        assert!(matches!(result, Err(LlmServiceError::ParseError(_))));
    }

    #[test]
    fn test_request_body_plain() {
        let request = GenerateRequest::new("gemini-2.5-flash", "Be brief", "Hi".to_string())
            .with_temperature(0.5);
        let body = request.to_body();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hi");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert!(body["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_request_body_structured() {
        let schema = json!({ "type": "OBJECT" });
        let body = GenerateRequest::new("m", "s", "c".to_string())
            .with_json_schema(schema.clone())
            .to_body();

        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"], schema);
        assert!(body["generationConfig"].get("temperature").is_none());
    }
}
