//! Clinical picture routes: shares, the public feed, the AI digest view
//! and the guarded digest trigger.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use afibdash_core::AppConfig;
use afibdash_protocol::validate::{validate_clinical_picture, ClinicalPictureSubmission};
use afibdash_store::{NewClinicalPicture, SummaryRow};
use afibdash_summarize::{build_summary_content, run_summary, SummaryContent};

use super::{enforce_rate_limit, parse_body, CLINICAL_PICTURE_RATE_LIMIT};
use crate::cache::{COUNT_TTL, FEED_TAG, FEED_TTL, SHARE_COUNT_TAG, SUMMARY_TAG, SUMMARY_TTL};
use crate::captcha::verify_turnstile;
use crate::error::ApiError;
use crate::state::AppState;

/// Shares shown in the public feed.
const FEED_LIMIT: usize = 10;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/clinical-picture", get(feed).post(share))
        .route("/clinical-picture/summary", get(summary_view))
        .route(
            "/clinical-picture/summarize",
            get(summarize_not_allowed).post(summarize),
        )
}

// ---------------------------------------------------------------
// Shares
// ---------------------------------------------------------------

/// POST /api/clinical-picture: captcha-gated anonymous share.
async fn share(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    enforce_rate_limit(&state, &headers, "clinical-picture:create", CLINICAL_PICTURE_RATE_LIMIT)?;

    let payload: ClinicalPictureSubmission = parse_body(&body)?;
    let token = payload.captcha_token();
    if token.is_empty() {
        return Err(ApiError::bad_request("Captcha is required."));
    }
    let verified = verify_turnstile(
        &state.http,
        &state.config.turnstile_verify_url,
        state.config.turnstile_secret.as_deref(),
        token,
    )
    .await;
    if !verified {
        return Err(ApiError::bad_request("Captcha validation failed."));
    }

    let picture = validate_clinical_picture(&payload, Utc::now().year())?;
    state
        .store
        .insert_clinical_picture(&NewClinicalPicture {
            diagnosis: picture.diagnosis,
            description: picture.description,
            diagnosis_year: picture.diagnosis_year,
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to save clinical picture submission");
            ApiError::save_failed()
        })?;

    state.cache.invalidate(FEED_TAG);
    state.cache.invalidate(SHARE_COUNT_TAG);
    info!("Clinical picture shared");

    Ok(Json(json!({ "success": true })))
}

/// GET /api/clinical-picture: newest shares with the total count.
async fn feed(State(state): State<Arc<AppState>>) -> Json<Value> {
    if let Some(hit) = state.cache.get(FEED_TAG) {
        return Json(hit);
    }

    match state.store.clinical_picture_feed(FEED_LIMIT).await {
        Ok(feed) => {
            let body = json!(feed);
            state.cache.put(FEED_TAG, body.clone(), FEED_TTL);
            Json(body)
        }
        Err(e) => {
            error!(error = %e, "Failed to load clinical picture feed");
            Json(json!({ "records": [], "totalCount": 0 }))
        }
    }
}

// ---------------------------------------------------------------
// AI digest
// ---------------------------------------------------------------

async fn share_count(state: &AppState) -> Option<u64> {
    if let Some(hit) = state.cache.get(SHARE_COUNT_TAG) {
        return hit.as_u64();
    }
    match state.store.count_clinical_pictures().await {
        Ok(count) => {
            state.cache.put(SHARE_COUNT_TAG, json!(count), COUNT_TTL);
            Some(count)
        }
        Err(e) => {
            warn!(error = %e, "Failed to count clinical pictures");
            None
        }
    }
}

/// Latest stored digest, cached on its own TTL. A cached `null` means no
/// digest exists yet; load failures are not cached.
async fn latest_summary(state: &AppState) -> Option<SummaryRow> {
    if let Some(hit) = state.cache.get(SUMMARY_TAG) {
        match serde_json::from_value::<Option<SummaryRow>>(hit) {
            Ok(row) => return row,
            Err(e) => warn!(error = %e, "Discarding unreadable cached summary"),
        }
    }
    match state.store.latest_summary().await {
        Ok(row) => {
            state.cache.put(SUMMARY_TAG, json!(row), SUMMARY_TTL);
            row
        }
        Err(e) => {
            error!(error = %e, "Failed to load clinical picture summary");
            None
        }
    }
}

/// GET /api/clinical-picture/summary: presentation-ready digest.
///
/// Built on every read from the cached digest and the separately cached
/// share count, so the headline follows new shares.
async fn summary_view(State(state): State<Arc<AppState>>) -> Json<SummaryContent> {
    let latest = latest_summary(&state).await;
    let share_count = share_count(&state).await;
    Json(build_summary_content(latest.as_ref(), share_count))
}

/// Secret from `Authorization: Bearer …`, else `x-cron-secret`.
fn provided_secret(headers: &HeaderMap) -> Option<String> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(auth) = header_str(header::AUTHORIZATION.as_str()) {
        if let (Some(scheme), Some(token)) = (auth.get(..7), auth.get(7..)) {
            if scheme.eq_ignore_ascii_case("bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }
    header_str("x-cron-secret").map(|v| v.trim().to_string())
}

/// Outside development a configured secret must be presented.
fn authorize_summarize(config: &AppConfig, headers: &HeaderMap) -> Result<(), ApiError> {
    if config.development {
        return Ok(());
    }
    let Some(expected) = config.summary_secret.as_deref() else {
        error!("CLINICAL_PICTURE_SUMMARY_SECRET is not configured; refusing access.");
        return Err(ApiError::internal("Server misconfigured"));
    };
    match provided_secret(headers) {
        Some(given) if !given.is_empty() && given == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

/// POST /api/clinical-picture/summarize: regenerate the digest.
async fn summarize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize_summarize(&state.config, &headers)?;

    let outcome = run_summary(&state.store, &state.http, &state.summary_config).await?;
    state.cache.invalidate(SUMMARY_TAG);

    Ok(Json(json!({
        "ok": true,
        "source_rows": outcome.source_rows,
        "sampled_rows": outcome.sampled_rows,
    })))
}

/// GET /api/clinical-picture/summarize: never runs the job.
async fn summarize_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
