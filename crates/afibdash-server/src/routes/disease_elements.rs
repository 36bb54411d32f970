//! Disease element routes: categories, survey cards, stats and new
//! community-contributed elements.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use afibdash_core::category::fallback_cards;
use afibdash_core::Category;
use afibdash_protocol::validate::{validate_element, ElementSubmission};
use afibdash_store::{NewAnswer, NewElement};

use super::{enforce_rate_limit, parse_body, CategoryQuery, ELEMENT_RATE_LIMIT};
use crate::cache::{stats_tag, STATS_TTL};
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/disease-element", get(survey_cards).post(create_element))
        .route("/disease-element/stats", get(element_stats))
}

/// GET /api/categories: category catalog with fallback cards.
async fn list_categories() -> Json<Value> {
    Json(json!({ "categories": Category::all() }))
}

/// GET /api/disease-element: shuffled survey cards for one category.
async fn survey_cards(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let element_type = query.required()?;

    let cards = match state.store.element_cards(element_type).await {
        Ok(cards) => cards,
        Err(e) => {
            error!(error = %e, type_id = element_type.id(), "Failed to load disease elements");
            Vec::new()
        }
    };
    let fallback = cards.is_empty();
    let cards = if fallback { fallback_cards(element_type) } else { cards };

    Ok(Json(json!({
        "typeId": element_type,
        "cards": cards,
        "fallback": fallback,
    })))
}

/// GET /api/disease-element/stats: yes/no totals per element.
async fn element_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let element_type = query.required()?;
    let tag = stats_tag(element_type);
    if let Some(hit) = state.cache.get(&tag) {
        return Ok(Json(hit));
    }

    let body = match state.store.element_stats(element_type).await {
        Ok(stats) => {
            let body = json!({ "typeId": element_type, "stats": stats });
            state.cache.put(tag, body.clone(), STATS_TTL);
            body
        }
        Err(e) => {
            error!(
                error = %e,
                type_id = element_type.id(),
                "Failed to load disease elements for stats"
            );
            json!({ "typeId": element_type, "stats": [] })
        }
    };
    Ok(Json(body))
}

/// POST /api/disease-element: add an element with a first `yes` vote.
async fn create_element(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    enforce_rate_limit(&state, &headers, "disease-element:create", ELEMENT_RATE_LIMIT)?;

    let payload: ElementSubmission = parse_body(&body)?;
    let element = validate_element(&payload)?;
    let element_type = element.element_type;

    let element_id = state
        .store
        .insert_element(&NewElement {
            name: element.name,
            description: element.description,
            type_id: element_type,
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to save disease element");
            ApiError::save_failed()
        })?;

    let default_answer = NewAnswer {
        element_id,
        answer: true,
    };
    if let Err(e) = state.store.insert_answers(&[default_answer]).await {
        error!(error = %e, element_id, "Failed to save disease element default answer");
        if let Err(e) = state.store.delete_element(element_id).await {
            error!(
                error = %e,
                element_id,
                "Failed to roll back disease element after answer insert failure"
            );
        }
        return Err(ApiError::save_failed());
    }

    state.cache.invalidate_elements(&[element_type]);
    info!(element_id, type_id = element_type.id(), "Disease element created");

    Ok(Json(json!({ "success": true })))
}
