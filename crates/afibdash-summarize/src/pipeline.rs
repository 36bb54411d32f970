//! End-to-end digest job: load, sample, prompt, validate, store.

use chrono::{Datelike, Utc};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use afibdash_store::Store;

use crate::config::SummaryConfig;
use crate::digest::{build_digest, normalize_summary};
use crate::prompt::{build_messages, prepare_row, PreparedRow, PromptMeta};
use crate::providers::complete_json;
use crate::sampling::{median_years_since_diagnosis, sample_rows};

/// Why a digest run stopped. The display text is safe to return to callers.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("OPENAI_API_KEY is missing.")]
    MissingApiKey,

    #[error("Failed to load clinical picture data.")]
    Load(#[source] afibdash_core::Error),

    #[error("No clinical pictures available to summarize.")]
    NoRows,

    #[error("Unable to generate summary right now.")]
    Model(#[source] afibdash_core::Error),

    #[error("No summary generated.")]
    EmptyReply,

    #[error("Failed to parse summary content.")]
    Unparsable(#[source] serde_json::Error),

    #[error("Invalid summary content.")]
    InvalidShape,

    #[error("Failed to save summary.")]
    Save(#[source] afibdash_core::Error),
}

impl SummaryError {
    /// Nothing to summarize is the caller's problem; everything else is ours.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NoRows)
    }
}

/// Counts reported after a stored digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryOutcome {
    pub source_rows: u64,
    pub sampled_rows: usize,
}

/// Generate and store a fresh digest of the newest clinical pictures.
pub async fn run_summary(
    store: &Store,
    client: &Client,
    config: &SummaryConfig,
) -> Result<SummaryOutcome, SummaryError> {
    let api_key = config.api_key.as_deref().ok_or(SummaryError::MissingApiKey)?;

    let total_count = match store.count_clinical_pictures().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Failed to count clinical pictures for summary");
            None
        }
    };

    let rows = store
        .recent_clinical_pictures(config.db_rows)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch clinical pictures for summary");
            SummaryError::Load(e)
        })?;
    if rows.is_empty() {
        return Err(SummaryError::NoRows);
    }

    let median_years = median_years_since_diagnosis(&rows, Utc::now().year());
    let sampled = sample_rows(&rows, config.model_rows, &mut rand::thread_rng());
    let prepared: Vec<PreparedRow> = sampled.iter().map(|row| prepare_row(row, config)).collect();

    let messages = build_messages(
        &prepared,
        PromptMeta {
            total_rows: total_count,
            median_years,
            sampled_rows: prepared.len(),
        },
    );

    let content = complete_json(
        client,
        &config.base_url,
        &messages,
        &config.model,
        api_key,
        config.temperature,
    )
    .await
    .map_err(|e| {
        error!(error = %e, model = %config.model, "Clinical picture summarize failed");
        SummaryError::Model(e)
    })?
    .ok_or(SummaryError::EmptyReply)?;

    let parsed: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        error!(error = %e, "Failed to parse summary JSON");
        SummaryError::Unparsable(e)
    })?;
    let shape = normalize_summary(&parsed).ok_or(SummaryError::InvalidShape)?;

    let source_rows = total_count.unwrap_or(rows.len() as u64);
    let digest = build_digest(&shape, median_years, source_rows);
    store.insert_summary(&digest).await.map_err(|e| {
        error!(error = %e, "Failed to store clinical picture summary");
        SummaryError::Save(e)
    })?;

    info!(
        source_rows,
        sampled_rows = prepared.len(),
        "Stored clinical picture summary"
    );

    Ok(SummaryOutcome {
        source_rows,
        sampled_rows: prepared.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use afibdash_store::SqliteStore;

    #[tokio::test]
    async fn test_missing_api_key_stops_before_loading() {
        let store = Store::Sqlite(SqliteStore::open_in_memory().unwrap());
        let config = SummaryConfig::default();
        let err = run_summary(&store, &Client::new(), &config).await.unwrap_err();
        assert!(matches!(err, SummaryError::MissingApiKey));
        assert_eq!(err.to_string(), "OPENAI_API_KEY is missing.");
    }

    #[tokio::test]
    async fn test_no_rows_is_a_client_error() {
        let store = Store::Sqlite(SqliteStore::open_in_memory().unwrap());
        let mut config = SummaryConfig::default();
        config.api_key = Some("sk-test".into());
        let err = run_summary(&store, &Client::new(), &config).await.unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "No clinical pictures available to summarize.");
    }
}
