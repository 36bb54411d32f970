//! Small text and number helpers shared by validation and summarization.
//!
//! Lengths are counted in `char`s, never bytes.

/// Trim and collapse every whitespace run to a single space.
pub fn sanitize_text(value: Option<&str>) -> String {
    match value {
        Some(v) => v.split_whitespace().collect::<Vec<_>>().join(" "),
        None => String::new(),
    }
}

/// Parse an integer setting, falling back when absent or not a whole number,
/// and clamp the result into `[min, max]`.
pub fn clamp_int(raw: Option<&str>, fallback: i64, min: i64, max: i64) -> i64 {
    let parsed = raw.map(str::trim).and_then(|s| {
        s.parse::<i64>().ok().or_else(|| {
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        })
    });
    match parsed {
        Some(v) => v.clamp(min, max),
        None => fallback,
    }
}

/// Cut `value` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    if max_chars <= 1 {
        return value.chars().take(max_chars).collect();
    }
    let mut out: String = value.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

pub fn char_len(value: &str) -> usize {
    value.chars().count()
}
