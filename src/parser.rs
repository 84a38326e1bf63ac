//! Parsing of free-text AI responses into typed values.
//!
//! The completion service returns prose with no guaranteed schema — the
//! response format is only a convention enforced by prompt wording. Every
//! known response shape is decoded here so the rest of the system works with
//! typed values and fails fast when the convention is violated. Functions
//! return `Err(detail)`; the AI gateway wraps that into
//! `WorkflowError::MalformedResponse` together with the operation name and
//! the raw text.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Marker prefix the lookup prompt asks the model to emit for ambiguous
/// locations.
pub const AMBIGUOUS_MARKER: &str = "AMBIGUOUS:";

/// Separator between the subject line and the HTML body in composed emails.
const SUBJECT_BODY_SEPARATOR: &str = "---";

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^SUMMARY:[ \t]*(.*)$").expect("valid regex"))
}

fn sentiment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^SENTIMENT:[ \t]*(.*)$").expect("valid regex"))
}

fn datetime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}").expect("valid regex"))
}

/// Split a key-value response into a map.
///
/// Each line containing a colon contributes one entry: the substring before
/// the first colon is the key (trimmed), everything after it is the value
/// (trimmed, embedded colons preserved). Lines without a colon are ignored.
pub fn key_value(text: &str) -> HashMap<String, String> {
    let mut result = HashMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            result.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    result
}

/// Detect the ambiguous-location shape: text starting with the marker,
/// followed by a pipe-separated candidate list.
///
/// Returns `None` when the text is not an ambiguity response — callers must
/// check this before attempting a normal parse.
pub fn ambiguous_candidates(text: &str) -> Option<Vec<String>> {
    let rest = text.trim().strip_prefix(AMBIGUOUS_MARKER)?;
    Some(
        rest.trim()
            .split('|')
            .map(|candidate| candidate.trim().to_string())
            .filter(|candidate| !candidate.is_empty())
            .collect(),
    )
}

/// Split a composed email into (subject, html body) on the `---` separator.
///
/// The first segment is the subject; everything after the first separator is
/// the body, with any further separators preserved verbatim.
pub fn subject_body(text: &str) -> Result<(String, String), String> {
    let trimmed = text.trim();
    match trimmed.split_once(SUBJECT_BODY_SEPARATOR) {
        Some((subject, body)) => Ok((subject.trim().to_string(), body.trim().to_string())),
        None => Err("expected a subject and body separated by '---'".to_string()),
    }
}

/// Extract the `SUMMARY:` and `SENTIMENT:` lines of an analysis response.
pub fn summary_sentiment(text: &str) -> Result<(String, String), String> {
    let summary = summary_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| "missing SUMMARY line".to_string())?;

    let sentiment = sentiment_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| "missing SENTIMENT line".to_string())?;

    Ok((summary, sentiment))
}

/// Parse the whole response as a non-negative millisecond delay.
pub fn delay_ms(text: &str) -> Result<u64, String> {
    let value: i64 = text
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not an integer", text.trim()))?;
    if value < 0 {
        return Err(format!("delay must not be negative, got {}", value));
    }
    Ok(value as u64)
}

/// Parse a time-conversion response: first line is the converted instant in
/// `YYYY-MM-DD HH:mm:ss` format, remaining lines are the explanation.
pub fn converted_time(text: &str) -> Result<(String, String), String> {
    let trimmed = text.trim();
    let mut lines = trimmed.lines();

    let first = lines.next().unwrap_or_default().trim();
    let explanation = lines.collect::<Vec<_>>().join("\n").trim().to_string();

    if explanation.is_empty() {
        return Err("expected an explanation after the converted time".to_string());
    }
    if !datetime_re().is_match(first) {
        return Err(format!(
            "first line '{}' is not a 'YYYY-MM-DD HH:mm:ss' timestamp",
            first
        ));
    }

    Ok((first.to_string(), explanation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_basic() {
        let text = "Time: 2026-08-07T09:30:00\nTimezone: Asia/Tokyo\nOffset: +09:00";
        let map = key_value(text);
        assert_eq!(map.get("Time").unwrap(), "2026-08-07T09:30:00");
        assert_eq!(map.get("Timezone").unwrap(), "Asia/Tokyo");
        assert_eq!(map.get("Offset").unwrap(), "+09:00");
    }

    #[test]
    fn test_key_value_preserves_colons_in_value() {
        let map = key_value("Time : 2026-08-07T09:30:00 ");
        // Value keeps its embedded colons; key and value are trimmed.
        assert_eq!(map.get("Time").unwrap(), "2026-08-07T09:30:00");
    }

    #[test]
    fn test_key_value_ignores_plain_lines() {
        let map = key_value("no separator here\nDST: true");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("DST").unwrap(), "true");
    }

    #[test]
    fn test_ambiguous_candidates_split_and_trim() {
        let text = "AMBIGUOUS: Springfield, Illinois, USA | Springfield, Massachusetts, USA";
        let candidates = ambiguous_candidates(text).expect("ambiguous");
        assert_eq!(
            candidates,
            vec![
                "Springfield, Illinois, USA".to_string(),
                "Springfield, Massachusetts, USA".to_string()
            ]
        );
    }

    #[test]
    fn test_ambiguous_requires_marker_prefix() {
        assert!(ambiguous_candidates("Time: 10:00").is_none());
        assert!(ambiguous_candidates("The location is AMBIGUOUS: a | b").is_none());
    }

    #[test]
    fn test_subject_body_example() {
        let (subject, body) = subject_body("Subject Line\n---\n<p>Body</p>").expect("parse");
        assert_eq!(subject, "Subject Line");
        assert_eq!(body, "<p>Body</p>");
    }

    #[test]
    fn test_subject_body_requires_separator() {
        assert!(subject_body("just a subject with no body").is_err());
    }

    #[test]
    fn test_subject_body_keeps_later_separators() {
        let (subject, body) =
            subject_body("Reminder\n---\n<hr>---<hr>\nmore").expect("parse");
        assert_eq!(subject, "Reminder");
        assert!(body.contains("---"));
    }

    #[test]
    fn test_summary_sentiment() {
        let text = "SUMMARY: The project launched successfully.\nSENTIMENT: Positive";
        let (summary, sentiment) = summary_sentiment(text).expect("parse");
        assert_eq!(summary, "The project launched successfully.");
        assert_eq!(sentiment, "Positive");
    }

    #[test]
    fn test_summary_sentiment_missing_label_fails() {
        assert!(summary_sentiment("SUMMARY: fine").is_err());
        assert!(summary_sentiment("SENTIMENT: Neutral").is_err());
    }

    #[test]
    fn test_summary_sentiment_labels_are_line_anchored() {
        let text = "notes: SUMMARY: not this one\nSUMMARY: the real one\nSENTIMENT: Neutral";
        let (summary, _) = summary_sentiment(text).expect("parse");
        assert_eq!(summary, "the real one");
    }

    #[test]
    fn test_delay_ms() {
        assert_eq!(delay_ms(" 60000 ").unwrap(), 60_000);
        assert_eq!(delay_ms("0").unwrap(), 0);
        assert!(delay_ms("-5").is_err());
        assert!(delay_ms("soon").is_err());
        assert!(delay_ms("12.5").is_err());
    }

    #[test]
    fn test_converted_time() {
        let text = "2025-09-14 10:48:00\nThe conversion crosses a DST boundary.";
        let (time, explanation) = converted_time(text).expect("parse");
        assert_eq!(time, "2025-09-14 10:48:00");
        assert_eq!(explanation, "The conversion crosses a DST boundary.");
    }

    #[test]
    fn test_converted_time_rejects_single_line() {
        assert!(converted_time("2025-09-14 10:48:00").is_err());
    }

    #[test]
    fn test_converted_time_rejects_bad_first_line() {
        assert!(converted_time("tomorrow at ten\nexplanation").is_err());
    }
}
