//! Contact-detail detection and PII redaction using regex patterns.
//!
//! Detection gates what users may submit. Redaction is the last line of
//! defense before text is sent to the summarization model or stored in a
//! digest, so the patterns stay deliberately broad.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

/// Kinds of personal contact information the filter recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiType {
    Url,
    Email,
    Handle,
    Phone,
    Address,
}

impl PiiType {
    pub fn label(&self) -> &'static str {
        match self {
            PiiType::Url => "URL",
            PiiType::Email => "EMAIL",
            PiiType::Handle => "HANDLE",
            PiiType::Phone => "PHONE",
            PiiType::Address => "ADDRESS",
        }
    }
}

/// Minimum digit count for a phone-shaped run to count as a phone number.
const PHONE_MIN_DIGITS: usize = 10;

// Compiled regex patterns (compiled once, reused).
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").unwrap());
static LINK_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)https?://|www\.").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhttps?://\S+\b").unwrap());
static WWW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bwww\.\S+\b").unwrap());
static DOMAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:[a-z0-9-]+\.)+[a-z]{2,}\b").unwrap());
static HANDLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|\s)@[\w.]{3,}\b").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+?[0-9][0-9\s().-]{8,}[0-9]").unwrap());
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b[0-9]{1,6}\s+[a-z0-9.'-]+(?:\s+[a-z0-9.'-]+){0,4}\s+(?:st|street|ave|avenue|rd|road|blvd|boulevard|ln|lane|dr|drive)\b",
    )
    .unwrap()
});

fn digit_count(s: &str) -> usize {
    s.chars().filter(char::is_ascii_digit).count()
}

fn contains_phone_number(text: &str) -> bool {
    PHONE_RE
        .find_iter(text)
        .any(|m| digit_count(m.as_str()) >= PHONE_MIN_DIGITS)
}

/// Report which kinds of contact information appear in `text`.
pub fn detect(text: &str) -> Vec<PiiType> {
    let mut found = Vec::new();

    if LINK_MARKER_RE.is_match(text) || DOMAIN_RE.is_match(text) {
        found.push(PiiType::Url);
    }
    let has_email = EMAIL_RE.is_match(text);
    if has_email {
        found.push(PiiType::Email);
    }
    // An email address already contains an `@word`, so it is not a handle.
    if !has_email && HANDLE_RE.is_match(text) {
        found.push(PiiType::Handle);
    }
    if contains_phone_number(text) {
        found.push(PiiType::Phone);
    }
    if ADDRESS_RE.is_match(text) {
        found.push(PiiType::Address);
    }

    found
}

/// True when `text` carries links or personal contact details.
pub fn contains_prohibited_content(text: &str) -> bool {
    !detect(text).is_empty()
}

/// Replace contact details and links with fixed placeholders.
///
/// Emails are replaced before links so the domain pattern never eats half
/// an address. Phone-shaped runs with fewer than ten digits are left as is.
pub fn redact(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let output = EMAIL_RE.replace_all(text, "[redacted email]");
    let output = URL_RE.replace_all(&output, "[redacted link]");
    let output = WWW_RE.replace_all(&output, "[redacted link]");
    let output = DOMAIN_RE.replace_all(&output, "[redacted link]");
    let output = HANDLE_RE.replace_all(&output, "${1}@[redacted]");
    let output = ADDRESS_RE.replace_all(&output, "[redacted address]");
    let output = PHONE_RE.replace_all(&output, |caps: &Captures| {
        let candidate = &caps[0];
        if digit_count(candidate) >= PHONE_MIN_DIGITS {
            "[redacted phone]".to_string()
        } else {
            candidate.to_string()
        }
    });

    output.trim().to_string()
}
