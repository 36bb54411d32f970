//! Survey vote routes.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use afibdash_core::ElementType;
use afibdash_protocol::validate::{validate_answers, AnswersSubmission};
use afibdash_store::NewAnswer;

use super::{enforce_rate_limit, parse_body, CategoryQuery, VOTE_RATE_LIMIT};
use crate::cache::{count_tag, COUNT_TTL};
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/disease-element/answers", post(submit_answers))
        .route("/disease-element/answers/count", get(count_answers))
}

/// POST /api/disease-element/answers: record a batch of yes/no votes.
async fn submit_answers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload: AnswersSubmission = parse_body(&body)?;
    enforce_rate_limit(&state, &headers, "votes", VOTE_RATE_LIMIT)?;
    let answers = validate_answers(&payload)?;

    let ids: Vec<i64> = answers.iter().map(|a| a.element_id).collect();
    let rows = state.store.element_types(&ids).await.map_err(|e| {
        error!(error = %e, "Failed to validate disease elements");
        ApiError::internal("Unable to validate answers right now.")
    })?;

    let known: HashSet<i64> = rows
        .iter()
        .filter(|row| row.element_type().is_some())
        .map(|row| row.id)
        .collect();
    let records: Vec<NewAnswer> = answers
        .iter()
        .filter(|a| known.contains(&a.element_id))
        .map(|a| NewAnswer {
            element_id: a.element_id,
            answer: a.answer,
        })
        .collect();
    if records.is_empty() {
        return Err(ApiError::bad_request("No valid answers provided."));
    }

    state.store.insert_answers(&records).await.map_err(|e| {
        error!(error = %e, "Failed to save disease element answers");
        ApiError::internal("Unable to save answers right now.")
    })?;

    let mut types: Vec<ElementType> = rows.iter().filter_map(|row| row.element_type()).collect();
    types.sort_by_key(|t| t.id());
    types.dedup();
    state.cache.invalidate_elements(&types);

    info!(saved = records.len(), "Disease element answers saved");
    Ok(Json(json!({ "success": true, "saved": records.len() })))
}

/// GET /api/disease-element/answers/count: total votes, optionally per
/// category.
async fn count_answers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let element_type = query.element_type()?;
    let tag = count_tag(element_type);
    if let Some(hit) = state.cache.get(&tag) {
        return Ok(Json(hit));
    }

    let body = match state.store.count_answers(element_type).await {
        Ok(count) => {
            let body = json!({ "count": count });
            state.cache.put(tag, body.clone(), COUNT_TTL);
            body
        }
        Err(e) => {
            error!(error = %e, "Failed to count disease element answers");
            json!({ "count": 0 })
        }
    };
    Ok(Json(body))
}
