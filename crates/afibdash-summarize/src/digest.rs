//! Model reply validation and the public summary view.

use afibdash_protocol::redact;
use afibdash_store::{NewSummary, SummaryRow};
use serde::Serialize;
use serde_json::Value;

const MAX_HIGHLIGHTS: usize = 3;
const NOT_STATED: &str = "Not stated";

/// Fields the model is asked to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryShape {
    pub summary: String,
    pub onset_setting: String,
    pub cofactor: String,
    pub insights: Vec<String>,
}

/// Accept the reply only if every text field is a non-empty string and at
/// least one insight is a string. Non-string insights are dropped.
pub fn normalize_summary(value: &Value) -> Option<SummaryShape> {
    let obj = value.as_object()?;
    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    let insights: Vec<String> = obj
        .get("insights")?
        .as_array()?
        .iter()
        .filter_map(|item| item.as_str().map(String::from))
        .collect();
    if insights.is_empty() {
        return None;
    }

    Some(SummaryShape {
        summary: text("summary")?,
        onset_setting: text("onset_setting")?,
        cofactor: text("cofactor")?,
        insights,
    })
}

/// Row to store for a validated reply. Every text field is redacted.
pub fn build_digest(
    shape: &SummaryShape,
    median_years: Option<i64>,
    source_rows: u64,
) -> NewSummary {
    NewSummary {
        summary: redact(shape.summary.trim()),
        median_time_since_diagnosis_years: median_years,
        most_cited_onset_setting: redact(shape.onset_setting.trim()),
        common_cofactor: redact(shape.cofactor.trim()),
        highlights: shape
            .insights
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .take(MAX_HIGHLIGHTS)
            .map(redact)
            .collect(),
        source_rows: source_rows as i64,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryStat {
    pub label: String,
    pub value: String,
}

/// Presentation-ready digest for the clinical picture page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryContent {
    pub headline: String,
    pub update_note: String,
    pub narrative: String,
    pub highlights: Vec<String>,
    pub stats: Vec<SummaryStat>,
}

fn stat(label: &str, value: String) -> SummaryStat {
    SummaryStat {
        label: label.to_string(),
        value,
    }
}

fn non_blank(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_STATED)
        .to_string()
}

fn format_median(years: Option<i64>) -> String {
    match years {
        Some(1) => "1 year".to_string(),
        Some(n) => format!("{n} years"),
        None => NOT_STATED.to_string(),
    }
}

/// Build the summary view from the latest digest, if any.
///
/// The headline count prefers the digest's own `source_rows` and falls back
/// to the live share count.
pub fn build_summary_content(row: Option<&SummaryRow>, share_count: Option<u64>) -> SummaryContent {
    let total = row.and_then(|r| {
        r.source_rows
            .map(|n| n.max(0) as u64)
            .or(share_count)
    });

    let headline = match total {
        Some(n) if n > 0 => format!("AI summary from {n} clinical picture shares"),
        _ => "AI summary".to_string(),
    };

    let narrative = row
        .map(|r| r.summary.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("No AI summary available yet.")
        .to_string();

    let highlights = row
        .and_then(|r| r.highlights.clone())
        .unwrap_or_default()
        .into_iter()
        .filter(|h| !h.is_empty())
        .collect();

    let stats = match row {
        Some(r) => vec![
            stat("Median time since diagnosis", format_median(r.median_time_since_diagnosis_years)),
            stat("Most cited onset setting", non_blank(r.most_cited_onset_setting.as_deref())),
            stat("Common co-factor", non_blank(r.common_cofactor.as_deref())),
        ],
        None => Vec::new(),
    };

    SummaryContent {
        headline,
        update_note: "Updates every 24 hours as new clinical pictures are shared.".to_string(),
        narrative,
        highlights,
        stats,
    }
}
