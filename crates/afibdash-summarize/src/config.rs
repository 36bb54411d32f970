//! Summary job settings.

use afibdash_core::text::clamp_int;
use serde::Serialize;
use tracing::warn;

pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const SUMMARY_TEMPERATURE: f64 = 0.2;

/// Model choice and input bounds for the digest job.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryConfig {
    pub model: String,
    /// Newest rows loaded from the store.
    pub db_rows: usize,
    /// Rows forwarded to the model after sampling.
    pub model_rows: usize,
    pub max_diagnosis_chars: usize,
    pub max_description_chars: usize,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

impl SummaryConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let bounded = |key: &str, fallback: i64, min: i64, max: i64| {
            clamp_int(var(key).as_deref(), fallback, min, max) as usize
        };

        let api_key = var("OPENAI_API_KEY");
        if api_key.is_none() {
            warn!("OPENAI_API_KEY not set; summary generation will fail");
        }

        Self {
            model: var("CLINICAL_PICTURE_SUMMARY_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            db_rows: bounded("CLINICAL_PICTURE_SUMMARY_DB_ROWS", 500, 50, 5_000),
            model_rows: bounded("CLINICAL_PICTURE_SUMMARY_MODEL_ROWS", 120, 20, 500),
            max_diagnosis_chars: bounded(
                "CLINICAL_PICTURE_SUMMARY_MAX_DIAGNOSIS_CHARS",
                120,
                20,
                240,
            ),
            max_description_chars: bounded(
                "CLINICAL_PICTURE_SUMMARY_MAX_DESCRIPTION_CHARS",
                700,
                100,
                4_000,
            ),
            api_key,
            base_url: var("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            temperature: SUMMARY_TEMPERATURE,
        }
    }
}
