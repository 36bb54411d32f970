//! Periodic clinical picture digest.

use std::sync::Arc;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use afibdash_summarize::run_summary;

use crate::cache::SUMMARY_TAG;
use crate::state::AppState;

/// Run the summary pipeline every `summary_interval`, if one is configured.
pub fn start_summary_scheduler(state: Arc<AppState>) {
    let Some(period) = state.config.summary_interval else {
        info!("Summary scheduler disabled (SUMMARY_INTERVAL_HOURS not set)");
        return;
    };

    tokio::spawn(async move {
        info!("Summary scheduler started, every {}h", period.as_secs() / 3600);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            refresh_summary(&state).await;
        }
    });
}

async fn refresh_summary(state: &AppState) {
    match run_summary(&state.store, &state.http, &state.summary_config).await {
        Ok(outcome) => {
            state.cache.invalidate(SUMMARY_TAG);
            info!(
                source_rows = outcome.source_rows,
                sampled_rows = outcome.sampled_rows,
                "Scheduled summary refreshed"
            );
        }
        Err(e) => error!(error = %e, "Scheduled summary failed"),
    }
}
