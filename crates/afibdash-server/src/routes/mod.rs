//! HTTP route handlers, one module per feature, nested under `/api`.

pub mod answers;
pub mod clinical_picture;
pub mod disease_elements;
pub mod health;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use afibdash_core::ElementType;
use afibdash_protocol::RateLimit;

use crate::client_ip::client_ip;
use crate::error::ApiError;
use crate::state::AppState;

const TEN_MINUTES: Duration = Duration::from_secs(10 * 60);

pub const ELEMENT_RATE_LIMIT: RateLimit = RateLimit::new(TEN_MINUTES, 12);
pub const VOTE_RATE_LIMIT: RateLimit = RateLimit::new(TEN_MINUTES, 12);
pub const CLINICAL_PICTURE_RATE_LIMIT: RateLimit = RateLimit::new(TEN_MINUTES, 6);

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(disease_elements::routes())
        .merge(answers::routes())
        .merge(clinical_picture::routes())
}

/// Count a request against `scope` for the calling client.
///
/// Requests without an identifiable client address are not limited.
pub(crate) fn enforce_rate_limit(
    state: &AppState,
    headers: &HeaderMap,
    scope: &str,
    limit: RateLimit,
) -> Result<(), ApiError> {
    let Some(ip) = client_ip(headers) else {
        return Ok(());
    };
    state
        .rate_limiter
        .check(&format!("{scope}:{ip}"), limit)
        .map_err(|retry_after| {
            warn!(scope, retry_after, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }
        })
}

/// Parse a JSON body leniently: any well-formed JSON is accepted and
/// non-object bodies read as an empty submission.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    let invalid = || ApiError::bad_request("Invalid request body.");
    let value: Value = serde_json::from_slice(body).map_err(|_| invalid())?;
    if !value.is_object() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|_| invalid())
}

/// `?typeId=` or `?category=` selector shared by the element read routes.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CategoryQuery {
    #[serde(rename = "typeId")]
    type_id: Option<String>,
    category: Option<String>,
}

impl CategoryQuery {
    /// `Ok(None)` when neither selector was given.
    pub(crate) fn element_type(&self) -> Result<Option<ElementType>, ApiError> {
        let unknown = || ApiError::bad_request("Unknown category.");
        if let Some(raw) = self.type_id.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            let id: i64 = raw.parse().map_err(|_| unknown())?;
            return ElementType::from_id(id).map(Some).ok_or_else(unknown);
        }
        if let Some(slug) = self.category.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            return ElementType::from_slug(slug).map(Some).ok_or_else(unknown);
        }
        Ok(None)
    }

    pub(crate) fn required(&self) -> Result<ElementType, ApiError> {
        self.element_type()?
            .ok_or_else(|| ApiError::bad_request("Unknown category."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afibdash_protocol::validate::ElementSubmission;

    fn query(type_id: Option<&str>, category: Option<&str>) -> CategoryQuery {
        CategoryQuery {
            type_id: type_id.map(String::from),
            category: category.map(String::from),
        }
    }

    #[test]
    fn test_category_query() {
        assert_eq!(query(Some("2"), None).required().unwrap(), ElementType::Symptom);
        assert_eq!(query(None, Some("supplements")).required().unwrap(), ElementType::Supplement);
        assert_eq!(query(Some("1"), Some("symptoms")).required().unwrap(), ElementType::Trigger);
        assert!(query(None, None).element_type().unwrap().is_none());
        assert!(query(None, None).required().is_err());
        assert!(query(Some("7"), None).element_type().is_err());
        assert!(query(Some("one"), None).element_type().is_err());
        assert!(query(None, Some("vitamins")).element_type().is_err());
    }

    #[test]
    fn test_parse_body() {
        let parsed: ElementSubmission = parse_body(br#"{"name": "Coffee", "typeId": 1}"#).unwrap();
        assert_eq!(parsed.name, serde_json::json!("Coffee"));

        let parsed: ElementSubmission = parse_body(b"[1, 2]").unwrap();
        assert!(parsed.name.is_null());

        let err = parse_body::<ElementSubmission>(b"{not json").unwrap_err();
        assert_eq!(err.to_string(), "Invalid request body.");
    }
}
