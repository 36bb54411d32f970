//! AI digest of shared clinical pictures.
//!
//! Rows are sampled, sanitized and redacted before they reach the model.
//! The model reply is validated, redacted again and stored as the current
//! digest. Model calls go to an OpenAI-compatible chat-completions API.

pub mod config;
pub mod digest;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod sampling;

pub use config::SummaryConfig;
pub use digest::{
    build_summary_content, normalize_summary, SummaryContent, SummaryShape, SummaryStat,
};
pub use pipeline::{run_summary, SummaryError, SummaryOutcome};
pub use prompt::ChatMessage;
