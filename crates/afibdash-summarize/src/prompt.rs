//! Model input: redacted rows and the fixed instructions.

use afibdash_core::text::{sanitize_text, truncate};
use afibdash_protocol::redact;
use afibdash_store::ClinicalPictureRow;
use serde::{Deserialize, Serialize};

use crate::config::SummaryConfig;

const SYSTEM_PROMPT: &[&str] = &[
    "You summarize anonymous AFib experience submissions for learning and pattern-spotting.",
    "No medical advice: do not instruct, recommend, diagnose, or suggest treatments; avoid 'should/try/avoid' and avoid second-person ('you/your').",
    "Be calm, neutral, factual, and privacy-preserving: do not quote verbatim; do not include names, locations, exact dates/times, or identifying details.",
    "Only use information supported by the provided data; do not invent details. If uncertain or missing, write 'Not stated'.",
    "Write for clarity and comprehension while staying concise.",
    "Output must be valid JSON only with keys: summary, onset_setting, cofactor, insights.",
    "Constraints:",
    "- summary: maximum 10 sentences.",
    "- onset_setting: the most frequently mentioned onset setting; short phrase (<= 6 words).",
    "- cofactor: the most frequently mentioned cofactor/trigger; short phrase (<= 6 words).",
    "- insights: exactly 3 items; each item <= 18 words; describe commonly reported patterns or experiences (not advice).",
];

/// Chat message sent to the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// One entry as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedRow {
    pub diagnosis: String,
    pub description: String,
}

/// Aggregates stated alongside the entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptMeta {
    pub total_rows: Option<u64>,
    pub median_years: Option<i64>,
    pub sampled_rows: usize,
}

/// Sanitize, redact, then truncate. Redacting first keeps a cut from
/// leaving half an email or phone number behind.
pub fn prepare_row(row: &ClinicalPictureRow, config: &SummaryConfig) -> PreparedRow {
    PreparedRow {
        diagnosis: truncate(
            &redact(&sanitize_text(row.diagnosis.as_deref())),
            config.max_diagnosis_chars,
        ),
        description: truncate(
            &redact(&sanitize_text(row.description.as_deref())),
            config.max_description_chars,
        ),
    }
}

pub fn build_messages(rows: &[PreparedRow], meta: PromptMeta) -> Vec<ChatMessage> {
    let total_line = match meta.total_rows {
        Some(total) => format!("Total submissions (pre-count): {total}"),
        None => "Total submissions: Not stated".to_string(),
    };
    let median_line = match meta.median_years {
        Some(years) => format!("Median years since diagnosis (pre-computed): {years}"),
        None => "Median years since diagnosis: Not stated".to_string(),
    };
    // Serializing plain string pairs cannot fail.
    let data = serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string());

    let user = [
        total_line,
        median_line,
        format!("Sampled entries provided: {}", meta.sampled_rows),
        "Data (array of entries):".to_string(),
        data,
    ]
    .join("\n");

    vec![ChatMessage::system(SYSTEM_PROMPT.join("\n")), ChatMessage::user(user)]
}
