//! Validation of anonymous submissions.
//!
//! Payload fields are kept as raw JSON values so loosely typed clients get
//! a precise message instead of a generic deserialization failure. Every
//! error carries the exact text shown back to the user.

use std::collections::HashSet;

use afibdash_core::text::{char_len, sanitize_text};
use afibdash_core::ElementType;
use serde::Deserialize;
use serde_json::Value;

use crate::pii::contains_prohibited_content;

pub const ELEMENT_NAME_MAX_CHARS: usize = 120;
pub const ELEMENT_DESCRIPTION_MAX_CHARS: usize = 800;
pub const MAX_ANSWERS_PER_REQUEST: usize = 50;
pub const DIAGNOSIS_MAX_CHARS: usize = 240;
pub const CLINICAL_PICTURE_MIN_CHARS: usize = 20;
pub const CLINICAL_PICTURE_MAX_CHARS: usize = 4000;
pub const EARLIEST_DIAGNOSIS_YEAR: i64 = 1900;

const PROHIBITED_CONTENT_MESSAGE: &str =
    "Please remove personal contact info or links (emails, phone numbers, handles, URLs).";

/// A submission rejected with a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

pub type Validated<T> = Result<T, ValidationError>;

fn text_field(value: &Value) -> String {
    sanitize_text(value.as_str())
}

/// Integer value of a JSON number, accepting `3.0` but not `3.5`.
fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

// ---------------------------------------------------------------
// Disease elements
// ---------------------------------------------------------------

/// Body of a new trigger/symptom/supplement submission.
#[derive(Debug, Default, Deserialize)]
pub struct ElementSubmission {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub description: Value,
    #[serde(default, rename = "typeId")]
    pub type_id: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedElement {
    pub name: String,
    pub description: Option<String>,
    pub element_type: ElementType,
}

pub fn validate_element(payload: &ElementSubmission) -> Validated<ValidatedElement> {
    let name = text_field(&payload.name);
    let description = text_field(&payload.description);

    if name.is_empty() {
        return Err(ValidationError::new("Name is required."));
    }
    if char_len(&name) > ELEMENT_NAME_MAX_CHARS {
        return Err(ValidationError::new("Name must be 120 characters or less."));
    }

    let description = Some(description).filter(|d| !d.is_empty());
    if description
        .as_deref()
        .is_some_and(|d| char_len(d) > ELEMENT_DESCRIPTION_MAX_CHARS)
    {
        return Err(ValidationError::new("Description must be 800 characters or less."));
    }

    let combined = format!("{}\n{}", name, description.as_deref().unwrap_or(""));
    if contains_prohibited_content(&combined) {
        return Err(ValidationError::new(PROHIBITED_CONTENT_MESSAGE));
    }

    // Clients send the id as a number, older forms as a numeric string.
    let type_id = match &payload.type_id {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|f| whole_number(&Value::from(f))),
        other => whole_number(other),
    };
    let element_type = type_id
        .and_then(ElementType::from_id)
        .ok_or_else(|| ValidationError::new("Unknown category for this submission."))?;

    Ok(ValidatedElement {
        name,
        description,
        element_type,
    })
}

// ---------------------------------------------------------------
// Votes
// ---------------------------------------------------------------

/// Body of a batch of survey votes.
#[derive(Debug, Default, Deserialize)]
pub struct AnswersSubmission {
    #[serde(default)]
    pub answers: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedAnswer {
    pub element_id: i64,
    pub answer: bool,
}

/// Keep well-formed votes, first occurrence per element wins.
pub fn validate_answers(payload: &AnswersSubmission) -> Validated<Vec<ValidatedAnswer>> {
    let entries = payload.answers.as_array().map(Vec::as_slice).unwrap_or(&[]);
    if entries.is_empty() {
        return Err(ValidationError::new("No answers provided."));
    }

    let mut seen = HashSet::new();
    let mut sanitized = Vec::new();
    for entry in entries {
        let Some(element_id) = entry.get("elementId").and_then(whole_number) else {
            continue;
        };
        let Some(answer) = entry.get("answer").and_then(Value::as_bool) else {
            continue;
        };
        if !seen.insert(element_id) {
            continue;
        }
        sanitized.push(ValidatedAnswer { element_id, answer });
    }

    if sanitized.is_empty() {
        return Err(ValidationError::new("No valid answers provided."));
    }
    if sanitized.len() > MAX_ANSWERS_PER_REQUEST {
        return Err(ValidationError::new("Too many answers submitted at once."));
    }

    Ok(sanitized)
}

// ---------------------------------------------------------------
// Clinical pictures
// ---------------------------------------------------------------

/// Body of a clinical picture share.
#[derive(Debug, Default, Deserialize)]
pub struct ClinicalPictureSubmission {
    #[serde(default)]
    pub diagnosis: Value,
    #[serde(default)]
    pub description: Value,
    #[serde(default, rename = "diagnosisYear")]
    pub diagnosis_year: Value,
    #[serde(default, rename = "captchaToken")]
    pub captcha_token: Value,
    #[serde(default)]
    pub acknowledged: Value,
}

impl ClinicalPictureSubmission {
    /// Trimmed captcha token, empty when missing.
    pub fn captcha_token(&self) -> &str {
        self.captcha_token.as_str().map(str::trim).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClinicalPicture {
    pub diagnosis: String,
    pub description: String,
    pub diagnosis_year: Option<i32>,
}

pub fn validate_clinical_picture(
    payload: &ClinicalPictureSubmission,
    current_year: i32,
) -> Validated<ValidatedClinicalPicture> {
    let diagnosis = text_field(&payload.diagnosis);
    let description = text_field(&payload.description);

    if diagnosis.is_empty() {
        return Err(ValidationError::new("Diagnosis is required."));
    }
    if char_len(&diagnosis) > DIAGNOSIS_MAX_CHARS {
        return Err(ValidationError::new("Diagnosis must be 240 characters or less."));
    }

    if char_len(&description) < CLINICAL_PICTURE_MIN_CHARS {
        return Err(ValidationError::new(
            "Clinical picture is required and must be at least 20 characters.",
        ));
    }
    if char_len(&description) > CLINICAL_PICTURE_MAX_CHARS {
        return Err(ValidationError::new("Clinical picture must be 4000 characters or less."));
    }

    if contains_prohibited_content(&format!("{diagnosis}\n{description}")) {
        return Err(ValidationError::new(PROHIBITED_CONTENT_MESSAGE));
    }

    let diagnosis_year = match &payload.diagnosis_year {
        Value::Null => None,
        raw => {
            let year = raw
                .is_number()
                .then(|| whole_number(raw))
                .flatten()
                .ok_or_else(|| ValidationError::new("Diagnosis year must be a whole number."))?;
            if year < EARLIEST_DIAGNOSIS_YEAR || year > i64::from(current_year) {
                return Err(ValidationError(format!(
                    "Diagnosis year must be between {EARLIEST_DIAGNOSIS_YEAR} and {current_year}."
                )));
            }
            Some(year as i32)
        }
    };

    if payload.acknowledged != Value::Bool(true) {
        return Err(ValidationError::new(
            "Please confirm this is a self-reported AFib diagnosis before submitting.",
        ));
    }

    Ok(ValidatedClinicalPicture {
        diagnosis,
        description,
        diagnosis_year,
    })
}
