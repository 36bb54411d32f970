//! Anti-abuse protocol for anonymous submissions.
//!
//! Regex-based detection of contact details and links, PII redaction
//! applied before text leaves the process, payload validation for every
//! write endpoint, and a best-effort fixed-window rate limiter.

pub mod pii;
pub mod rate_limit;
pub mod validate;

pub use pii::{contains_prohibited_content, redact, PiiType};
pub use rate_limit::{RateLimit, RateLimiter};
pub use validate::ValidationError;
