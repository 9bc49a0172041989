pub mod llm;
pub mod logging;

pub use llm::{
    ConsistencyRequest, ConsistencyResult, FeedbackRequest, InterviewAssistant, Language,
    LlmConfig, LlmServiceError, SummaryRequest, SummaryStyle, TranslationRequest,
};
