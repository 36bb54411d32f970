//! Hosted PostgREST backend (Supabase).
//!
//! Speaks the plain REST dialect: `select`/`order`/`limit` query params,
//! `in.(…)` filters, `Prefer: count=exact` with `Content-Range` for counts,
//! and one RPC for vote aggregation.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::types::*;
use afibdash_core::{ElementType, Error, Result};

const CLINICAL_PICTURE_COLUMNS: &str = "id,created_at,diagnosis,description,diagnosis_year";
const SUMMARY_COLUMNS: &str = "summary,median_time_since_diagnosis_years,most_cited_onset_setting,\
common_cofactor,highlights,source_rows,created_at";

/// Client for a PostgREST endpoint authenticated with a publishable key.
pub struct RestStore {
    client: Client,
    rest_url: String,
}

fn http_err(e: reqwest::Error) -> Error {
    Error::Http(e.to_string())
}

fn in_list(ids: &[i64]) -> String {
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("in.({joined})")
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/0`.
pub(crate) fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

/// Aggregate row as returned by the RPC; bigint columns may arrive as
/// numbers or numeric strings.
#[derive(Deserialize)]
struct RpcAggregateRow {
    element_id: Option<i64>,
    #[serde(default)]
    yes_answer: Value,
    #[serde(default)]
    no_answer: Value,
}

fn lenient_count(value: &Value) -> u64 {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n as u64)
        .unwrap_or(0)
}

#[derive(Deserialize)]
struct InsertedId {
    id: i64,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| Error::Config(format!("Invalid Supabase key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| Error::Config(format!("Invalid Supabase key: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(http_err)?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}/{}", self.rest_url, path))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Storage(format!("PostgREST returned {status}: {body}")));
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        self.send(builder).await?.json().await.map_err(http_err)
    }

    async fn count(&self, builder: RequestBuilder) -> Result<u64> {
        let response = self.send(builder.header("Prefer", "count=exact")).await?;
        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| Error::Storage("PostgREST count response missing Content-Range".into()))
    }

    // ---------------------------------------------------------------
    // Disease elements
    // ---------------------------------------------------------------

    pub async fn insert_element(&self, element: &NewElement) -> Result<i64> {
        let rows: Vec<InsertedId> = self
            .fetch(
                self.request(Method::POST, "disease_element")
                    .query(&[("select", "id")])
                    .header("Prefer", "return=representation")
                    .json(element),
            )
            .await?;
        rows.first()
            .map(|row| row.id)
            .ok_or_else(|| Error::Storage("Disease element insert did not return an id.".into()))
    }

    pub async fn delete_element(&self, id: i64) -> Result<()> {
        self.send(
            self.request(Method::DELETE, "disease_element")
                .query(&[("id", format!("eq.{id}"))]),
        )
        .await?;
        Ok(())
    }

    pub async fn list_elements(&self, element_type: ElementType) -> Result<Vec<ElementRow>> {
        self.fetch(self.request(Method::GET, "disease_element").query(&[
            ("select", "id,name,description".to_string()),
            ("type_id", format!("eq.{}", element_type.id())),
        ]))
        .await
    }

    pub async fn element_types(&self, ids: &[i64]) -> Result<Vec<ElementTypeRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch(self.request(Method::GET, "disease_element").query(&[
            ("select", "id,type_id".to_string()),
            ("id", in_list(ids)),
        ]))
        .await
    }

    // ---------------------------------------------------------------
    // Answers
    // ---------------------------------------------------------------

    pub async fn insert_answers(&self, answers: &[NewAnswer]) -> Result<()> {
        self.send(
            self.request(Method::POST, "disease_element_answers")
                .header("Prefer", "return=minimal")
                .json(answers),
        )
        .await?;
        Ok(())
    }

    pub async fn count_answers_by_elements(&self, ids: &[i64]) -> Result<Vec<AnswerAggregate>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<RpcAggregateRow> = self
            .fetch(
                self.request(Method::POST, "rpc/count_answers_by_elements")
                    .json(&json!({ "_element_ids": ids })),
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(AnswerAggregate {
                    element_id: row.element_id?,
                    yes: lenient_count(&row.yes_answer),
                    no: lenient_count(&row.no_answer),
                })
            })
            .collect())
    }

    pub async fn count_answers(&self, element_type: Option<ElementType>) -> Result<u64> {
        let mut builder = self
            .request(Method::HEAD, "disease_element_answers")
            .query(&[("select", "element_id")]);

        if let Some(t) = element_type {
            let ids: Vec<i64> = self
                .list_elements(t)
                .await?
                .into_iter()
                .map(|row| row.id)
                .collect();
            if ids.is_empty() {
                return Ok(0);
            }
            builder = builder.query(&[("element_id", in_list(&ids))]);
        }

        self.count(builder).await
    }

    // ---------------------------------------------------------------
    // Clinical pictures
    // ---------------------------------------------------------------

    pub async fn insert_clinical_picture(&self, picture: &NewClinicalPicture) -> Result<()> {
        self.send(
            self.request(Method::POST, "clinical_picture")
                .header("Prefer", "return=minimal")
                .json(picture),
        )
        .await?;
        Ok(())
    }

    pub async fn recent_clinical_pictures(&self, limit: usize) -> Result<Vec<ClinicalPictureRow>> {
        debug!(limit, "Fetching recent clinical pictures");
        self.fetch(self.request(Method::GET, "clinical_picture").query(&[
            ("select", CLINICAL_PICTURE_COLUMNS.to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]))
        .await
    }

    pub async fn count_clinical_pictures(&self) -> Result<u64> {
        self.count(
            self.request(Method::HEAD, "clinical_picture")
                .query(&[("select", "id")]),
        )
        .await
    }

    // ---------------------------------------------------------------
    // Summaries
    // ---------------------------------------------------------------

    pub async fn insert_summary(&self, summary: &NewSummary) -> Result<()> {
        self.send(
            self.request(Method::POST, "cp_summary")
                .header("Prefer", "return=minimal")
                .json(summary),
        )
        .await?;
        Ok(())
    }

    pub async fn latest_summary(&self) -> Result<Option<SummaryRow>> {
        let rows: Vec<SummaryRow> = self
            .fetch(self.request(Method::GET, "cp_summary").query(&[
                ("select", SUMMARY_COLUMNS),
                ("order", "created_at.desc"),
                ("limit", "1"),
            ]))
            .await?;
        Ok(rows.into_iter().next())
    }
}
