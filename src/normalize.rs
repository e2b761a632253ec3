use crate::types::Sentiment;

/// Reduce a free-text model response to one sentiment label.
///
/// Only the first whitespace-delimited token is inspected, case
/// insensitively and with surrounding punctuation stripped, so any amount
/// of trailing rationale is tolerated. Unrecognized tokens degrade to
/// `Unknown`; this function never fails.
pub fn normalize(raw: &str) -> Sentiment {
    let token = match raw.split_whitespace().next() {
        Some(t) => t,
        None => return Sentiment::Unknown,
    };
    let label = token
        .trim_matches(|c: char| !c.is_ascii_alphabetic())
        .to_ascii_lowercase();

    match label.as_str() {
        "bullish" => Sentiment::Bullish,
        "bearish" => Sentiment::Bearish,
        "mixed" => Sentiment::Mixed,
        _ => Sentiment::Unknown,
    }
}
