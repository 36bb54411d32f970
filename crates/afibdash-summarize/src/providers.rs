//! OpenAI-compatible chat completions.
//!
//! The digest needs a single JSON object back, so the call is a plain
//! request/response with `response_format: json_object` and no streaming.

use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use afibdash_core::{Error, Result};

use crate::prompt::ChatMessage;

/// Request a JSON-object completion and return the first choice's content.
///
/// `Ok(None)` means the API answered but produced no content.
pub async fn complete_json(
    client: &Client,
    base_url: &str,
    messages: &[ChatMessage],
    model: &str,
    api_key: &str,
    temperature: f64,
) -> Result<Option<String>> {
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    let body = json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
        "response_format": { "type": "json_object" },
    });

    debug!("Requesting completion from {} with model {}", url, model);

    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Http(format!("Request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Http(format!("API error {status}: {body}")));
    }

    let parsed: Value = response
        .json()
        .await
        .map_err(|e| Error::Http(format!("Invalid completion response: {e}")))?;
    Ok(first_choice_content(&parsed))
}

/// `choices[0].message.content` when it is a non-empty string.
pub fn first_choice_content(response: &Value) -> Option<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .filter(|content| !content.is_empty())
        .map(String::from)
}
