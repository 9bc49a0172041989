pub mod assistant;
pub mod config;
pub mod prompts;
pub mod retry;
pub mod service;

pub use assistant::{
    ConsistencyRequest, ConsistencyResult, FeedbackRequest, InterviewAssistant, SummaryRequest,
    TranslationRequest,
};
pub use config::LlmConfig;
pub use prompts::{Language, SummaryStyle};
pub use retry::{Classify, ErrorKind, RetryPolicy};
pub use service::{GeminiClient, GenerateRequest, GenerativeModel, LlmServiceError};
