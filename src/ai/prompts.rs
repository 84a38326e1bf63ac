//! Prompt templates for every completion intent.
//!
//! The response format of each intent is only a convention enforced by this
//! wording — the parser on the other side pins the same shapes, and the
//! tests in `parser.rs` and `ai/mod.rs` hold exact examples so silent format
//! drift is caught.

/// Timezone lookup: key-value response, or the `AMBIGUOUS:` marker with a
/// pipe-separated candidate list.
pub fn timezone_lookup(location: &str) -> String {
    format!(
        "For the location '{location}', provide the current local time in 'YYYY-MM-DDTHH:mm:ss' format, \
the official IANA timezone name (e.g., 'America/New_York'), the current UTC offset (e.g., '+01:00' or '-07:00'), \
whether Daylight Saving Time is currently active (true/false), a corrected or more specific location name, \
and a brief note about the next DST change (e.g., \"DST ends on Nov 5, 2024\").
If the location is ambiguous (e.g., 'Springfield'), respond ONLY with a line starting with 'AMBIGUOUS:' \
followed by a pipe-separated list of specific locations (e.g., 'AMBIGUOUS: Springfield, Illinois, USA | Springfield, Massachusetts, USA').
Format a successful response as a simple key-value string, with each key-value pair on a new line, like this:
Time: ...
Timezone: ...
Offset: ...
DST: ...
Location: ...
DST Info: ...
"
    )
}

/// Time conversion: first line is the converted instant, rest is prose.
pub fn convert_time(date_time: &str, from_zone: &str, to_zone: &str) -> String {
    format!(
        "Convert the date and time '{date_time}' from the '{from_zone}' timezone to the '{to_zone}' timezone.
Provide a detailed explanation of the conversion, including the resulting timezone name (e.g., EDT) and any DST considerations.
Your response MUST be formatted as follows:
1. The first line must contain ONLY the converted date and time in 'YYYY-MM-DD HH:mm:ss' format.
2. Subsequent lines should contain the detailed explanation.
"
    )
}

/// Reminder delay: bare integer milliseconds.
pub fn reminder_delay(date_time: &str, zone: &str) -> String {
    format!(
        "Calculate the number of milliseconds from right now until '{date_time}' in the '{zone}' timezone. \
Provide only the number of milliseconds as an integer."
    )
}

/// Reminder email: subject, `---`, HTML body.
pub fn reminder_email(message: &str, zone: &str) -> String {
    format!(
        "Generate a friendly and professional HTML email for a reminder.
The reminder is for: \"{message}\"
The reminder's timezone context is: \"{zone}\"

Your response MUST be formatted as follows, with \"---\" as a separator:
1. The first line must be the email subject.
2. The remaining lines must be the HTML body of the email.
"
    )
}

/// Document analysis: `SUMMARY:` and `SENTIMENT:` lines.
pub fn analyze_document(content: &str) -> String {
    format!(
        "Analyze the following text. Provide a concise summary (2-3 sentences) and a one-word sentiment analysis (Positive, Negative, or Neutral).
Format your response exactly like this:
SUMMARY: [Your summary here]
SENTIMENT: [Your sentiment here]
---
TEXT TO ANALYZE:
{content}
"
    )
}

/// Analysis email: subject, `---`, HTML body.
pub fn analysis_email(summary: &str, sentiment: &str, filename: &str) -> String {
    format!(
        "Generate a professional HTML email to a colleague summarizing the analysis of a document.
The document's name is: \"{filename}\"
The analysis summary is: \"{summary}\"
The overall sentiment was: \"{sentiment}\"

Your response MUST be formatted as follows, with \"---\" as a separator:
1. The first line must be the email subject.
2. The remaining lines must be the HTML body of the email.

Make the email friendly, clear, and professional.
"
    )
}

/// Free-form content generation from the content module.
pub fn content(topic: &str, content_type: &str, pages: u8) -> String {
    format!(
        "Generate a {pages}-page {} about the following topic: \"{topic}\"",
        content_type.to_lowercase()
    )
}

/// Prompt refinement: returns only the improved prompt.
pub fn refine(prompt: &str) -> String {
    format!(
        "Refine and improve the following prompt to be more descriptive and effective for a \
generative AI model. Return only the refined prompt. Prompt: \"{prompt}\""
    )
}

/// Provenance marker appended when a text attachment is inlined into a chat
/// turn.
pub fn attachment_marker(name: &str) -> String {
    format!("\n\n--- Content from {name} ---\n")
}
