//! Instruction templates and fixed messages for the interview assistant
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Shown instead of feedback when no API key is configured
pub const FEEDBACK_KEY_MISSING: &str = "尚未設定 AI 金鑰，無法提供建議。\nChưa cấu hình khóa API AI, không thể đưa ra góp ý.";

/// Shown when feedback could not be generated
pub const FEEDBACK_UNAVAILABLE: &str = "AI 服務暫時無法使用，請稍後再試。\nDịch vụ AI tạm thời không khả dụng, vui lòng thử lại sau.";

/// Shown instead of a summary when no API key is configured
pub const SUMMARY_KEY_MISSING: &str = "尚未設定 AI 金鑰，無法產生摘要。\nChưa cấu hình khóa API AI, không thể tạo bản tóm tắt.";

pub const FEEDBACK_TEMPERATURE: f32 = 0.7;
pub const SUMMARY_TEMPERATURE: f32 = 0.3;
pub const TRANSLATION_TEMPERATURE: f32 = 0.1;
pub const CONSISTENCY_TEMPERATURE: f32 = 0.0;

/// Languages the interview material is translated into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    Vi,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::Vi => "vi",
        }
    }

    /// Name used in instructions to the model
    pub fn label(self) -> &'static str {
        match self {
            Language::Zh => "Traditional Chinese (繁體中文)",
            Language::Vi => "Vietnamese (Tiếng Việt)",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zh" | "zh-tw" | "zh-hant" => Ok(Language::Zh),
            "vi" | "vi-vn" => Ok(Language::Vi),
            other => Err(format!("Unsupported language code: {}", other)),
        }
    }
}

/// Length and shape of a generated summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Concise,
    Detailed,
    Keypoints,
}

impl FromStr for SummaryStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "concise" => Ok(SummaryStyle::Concise),
            "detailed" => Ok(SummaryStyle::Detailed),
            "keypoints" => Ok(SummaryStyle::Keypoints),
            other => Err(format!("Unknown summary type: {}", other)),
        }
    }
}

pub fn feedback_instruction(target_language: &str) -> String {
    format!(
        "You are an experienced immigration consultant preparing a couple for a marriage \
        interview. Review both partners' answers to the same question. Point out where the \
        answers are vague, unconvincing or inconsistent with each other, and suggest how \
        each partner could answer more persuasively and consistently. Keep the advice \
        practical and respectful.\n\
        Write your entire response in {}. Do not use any other language.",
        target_language
    )
}

pub fn feedback_contents(question: &str, male_answer: &str, female_answer: &str) -> String {
    format!(
        "Interview question:\n{}\n\nHusband's answer:\n{}\n\nWife's answer:\n{}",
        question, male_answer, female_answer
    )
}

pub fn translation_instruction(language: Language) -> String {
    format!(
        "You are a professional translator. Translate the user's text into {}. \
        Return only the translated text, with no explanations, notes, quotation marks \
        or markdown formatting.",
        language.label()
    )
}

pub fn summary_instruction(target_language: &str, style: SummaryStyle) -> String {
    let shape = match style {
        SummaryStyle::Concise => {
            "Summarize the answer in a single short paragraph of no more than 30 words."
        }
        SummaryStyle::Detailed => {
            "Write a detailed summary of the answer of about 100 words, keeping every \
            concrete fact (names, dates, places)."
        }
        SummaryStyle::Keypoints => {
            "List the 3 to 5 key points of the answer as short bullet points, one per line, \
            each starting with \"- \"."
        }
    };

    format!(
        "You summarize answers given in a marriage interview. {}\n\
        Write your entire response in {}. Do not use any other language.",
        shape, target_language
    )
}

pub const CONSISTENCY_INSTRUCTION: &str = "You compare two spouses' answers to the same \
    marriage interview question. Ignore differences in wording, detail level, tone or \
    language. Only treat the answers as contradictory when they state conflicting facts, \
    such as different dates, locations, people or events. Set \"consistent\" to false only \
    for such a factual conflict, and then explain the conflict briefly in \"reason\". \
    Omit \"reason\" when the answers are consistent.";

pub fn consistency_contents(question: &str, male_answer: &str, female_answer: &str) -> String {
    format!(
        "Question: {}\nHusband: {}\nWife: {}",
        question, male_answer, female_answer
    )
}

/// Response schema for the consistency check
pub fn consistency_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "consistent": { "type": "BOOLEAN" },
            "reason": { "type": "STRING" }
        },
        "required": ["consistent"]
    })
}
