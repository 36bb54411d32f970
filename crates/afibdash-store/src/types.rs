//! Row types shared by both backends.

use afibdash_core::ElementType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A community-contributed trigger, symptom or supplement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRow {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Element id with its raw `type_id`, used to vet incoming votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTypeRow {
    pub id: i64,
    pub type_id: Option<i64>,
}

impl ElementTypeRow {
    pub fn element_type(&self) -> Option<ElementType> {
        self.type_id.and_then(ElementType::from_id)
    }
}

/// Yes/no vote totals for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerAggregate {
    pub element_id: i64,
    pub yes: u64,
    pub no: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NewAnswer {
    pub element_id: i64,
    pub answer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewElement {
    pub name: String,
    pub description: Option<String>,
    pub type_id: ElementType,
}

/// A shared clinical picture narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalPictureRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub diagnosis: Option<String>,
    pub description: Option<String>,
    pub diagnosis_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewClinicalPicture {
    pub diagnosis: String,
    pub description: String,
    pub diagnosis_year: Option<i32>,
}

/// Stored AI digest of the clinical pictures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub summary: String,
    pub median_time_since_diagnosis_years: Option<i64>,
    pub most_cited_onset_setting: Option<String>,
    pub common_cofactor: Option<String>,
    #[serde(default)]
    pub highlights: Option<Vec<String>>,
    pub source_rows: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSummary {
    pub summary: String,
    pub median_time_since_diagnosis_years: Option<i64>,
    pub most_cited_onset_setting: String,
    pub common_cofactor: String,
    pub highlights: Vec<String>,
    pub source_rows: i64,
}

/// Per-element row of a category stats table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementStat {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub yes: u64,
    pub no: u64,
    pub diff: i64,
}

/// Most recent clinical pictures plus the overall share count.
#[derive(Debug, Clone, Serialize)]
pub struct ClinicalPictureFeed {
    pub records: Vec<ClinicalPictureRow>,
    #[serde(rename = "totalCount")]
    pub total_count: u64,
}
