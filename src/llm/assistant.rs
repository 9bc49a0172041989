use crate::llm::config::LlmConfig;
use crate::llm::prompts::{self, Language, SummaryStyle};
use crate::llm::retry;
use crate::llm::service::{GeminiClient, GenerateRequest, GenerativeModel, LlmServiceError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Both partners' answers to one interview question
#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    pub question: String,
    pub male_answer: String,
    pub female_answer: String,
    /// Human-readable name of the language the advice is written in
    pub target_language: String,
}

#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub text: String,
    pub target: Language,
}

#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub answer: String,
    pub target_language: String,
    pub style: SummaryStyle,
}

impl SummaryRequest {
    /// Concise summary request
    pub fn new(answer: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            target_language: target_language.into(),
            style: SummaryStyle::default(),
        }
    }

    pub fn with_style(mut self, style: SummaryStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConsistencyRequest {
    pub question: String,
    pub male_answer: String,
    pub female_answer: String,
}

/// Verdict of the consistency check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    pub consistent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConsistencyResult {
    /// "No contradiction found", used whenever the check cannot run
    pub fn consistent() -> Self {
        Self {
            consistent: true,
            reason: None,
        }
    }

    /// Parse the model's structured answer
    pub fn from_response(text: &str) -> Result<Self, LlmServiceError> {
        serde_json::from_str(text.trim())
            .map_err(|e| LlmServiceError::MalformedResponse(e.to_string()))
    }
}

/// AI helper for interview preparation.
///
/// Every operation returns a usable value: upstream failures and a missing
/// API key are turned into each operation's fallback and never reach the caller.
pub struct InterviewAssistant {
    model: Arc<dyn GenerativeModel>,
    config: LlmConfig,
}

impl InterviewAssistant {
    pub fn new(config: LlmConfig) -> Result<Self, LlmServiceError> {
        config.validate().map_err(LlmServiceError::ConfigError)?;
        let client = GeminiClient::new(&config)?;
        Ok(Self::with_model(config, Arc::new(client)))
    }

    /// Create from environment configuration
    pub fn from_env() -> Result<Self, LlmServiceError> {
        Self::new(LlmConfig::from_env())
    }

    /// Use a custom model backend
    pub fn with_model(config: LlmConfig, model: Arc<dyn GenerativeModel>) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Advice on how persuasive and consistent the two answers are
    pub async fn feedback(&self, request: &FeedbackRequest) -> String {
        let Some(api_key) = self.config.credential() else {
            return prompts::FEEDBACK_KEY_MISSING.to_string();
        };

        let generate = GenerateRequest::new(
            &self.config.model,
            &prompts::feedback_instruction(&request.target_language),
            prompts::feedback_contents(
                &request.question,
                &request.male_answer,
                &request.female_answer,
            ),
        )
        .with_temperature(prompts::FEEDBACK_TEMPERATURE);

        match self.call(api_key, &generate).await {
            Ok(text) => text,
            Err(e) => {
                error!("Feedback generation failed: {}", e);
                prompts::FEEDBACK_UNAVAILABLE.to_string()
            }
        }
    }

    /// Translated text, or `None` when no translation is available
    pub async fn translate(&self, request: &TranslationRequest) -> Option<String> {
        let api_key = self.config.credential()?;

        let generate = GenerateRequest::new(
            &self.config.model,
            &prompts::translation_instruction(request.target),
            request.text.clone(),
        )
        .with_temperature(prompts::TRANSLATION_TEMPERATURE);

        match self.call(api_key, &generate).await {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Translation to {} failed: {}", request.target, e);
                None
            }
        }
    }

    /// Summary of an answer; `None` when generation failed
    pub async fn summarize(&self, request: &SummaryRequest) -> Option<String> {
        let Some(api_key) = self.config.credential() else {
            return Some(prompts::SUMMARY_KEY_MISSING.to_string());
        };

        let generate = GenerateRequest::new(
            &self.config.model,
            &prompts::summary_instruction(&request.target_language, request.style),
            request.answer.clone(),
        )
        .with_temperature(prompts::SUMMARY_TEMPERATURE);

        match self.call(api_key, &generate).await {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Summary ({:?}) failed: {}", request.style, e);
                None
            }
        }
    }

    /// Flags factual contradictions between the answers.
    ///
    /// Fails open: without a key, or on any error, the answers count as consistent.
    pub async fn check_consistency(&self, request: &ConsistencyRequest) -> ConsistencyResult {
        let Some(api_key) = self.config.credential() else {
            return ConsistencyResult::consistent();
        };

        let generate = GenerateRequest::new(
            &self.config.model,
            prompts::CONSISTENCY_INSTRUCTION,
            prompts::consistency_contents(
                &request.question,
                &request.male_answer,
                &request.female_answer,
            ),
        )
        .with_temperature(prompts::CONSISTENCY_TEMPERATURE)
        .with_json_schema(prompts::consistency_schema());

        let result = match self.call(api_key, &generate).await {
            Ok(text) => ConsistencyResult::from_response(&text),
            Err(e) => Err(e),
        };

        match result {
            Ok(verdict) => {
                debug!("Consistency verdict: consistent={}", verdict.consistent);
                verdict
            }
            Err(e) => {
                error!("Consistency check failed, assuming consistent: {}", e);
                ConsistencyResult::consistent()
            }
        }
    }

    async fn call(&self, api_key: &str, request: &GenerateRequest) -> Result<String, LlmServiceError> {
        retry::execute(&self.config.retry, || self.model.generate(api_key, request)).await
    }
}
