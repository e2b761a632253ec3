use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use crate::types::{LedgerError, Result};

/// Marker the publisher prints ahead of the article's date line. When
/// present, scanning starts there so boilerplate dates elsewhere on the
/// page cannot shadow the real one.
const PUBLISH_MARKER: &str = "Published as of:";

/// Pattern for the full "Month Day, Year" triple. The year is part of the
/// match; equality between runs compares normalized dates only, so any
/// time-of-day or timezone text after the triple is ignored.
const DATE_PATTERN: &str = r"[A-Z][a-z]+ \d{1,2}, \d{4}";

/// Pulls the publication date out of free-form article text.
pub struct PublishDateExtractor {
    re: Regex,
}

impl PublishDateExtractor {
    pub fn new() -> Self {
        let re = Regex::new(DATE_PATTERN).expect("date pattern must compile");
        Self { re }
    }

    /// Scan `text` for a month-name date expression and return the
    /// normalized calendar date together with the matched substring,
    /// verbatim. Candidates that look like dates but do not exist on the
    /// calendar are skipped and scanning continues.
    pub fn extract(&self, text: &str) -> Result<(NaiveDate, String)> {
        let search_region = match text.find(PUBLISH_MARKER) {
            Some(idx) => &text[idx..],
            None => text,
        };

        for candidate in self.re.find_iter(search_region) {
            let raw = candidate.as_str();
            match NaiveDate::parse_from_str(raw, "%B %d, %Y") {
                Ok(date) => {
                    debug!("Extracted publish date {} from '{}'", date, raw);
                    return Ok((date, raw.to_string()));
                }
                Err(e) => {
                    debug!("Skipping non-calendar date candidate '{}': {}", raw, e);
                }
            }
        }

        Err(LedgerError::DateNotFound)
    }
}

impl Default for PublishDateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_full_month_day_year_triple() {
        let extractor = PublishDateExtractor::new();
        let text = "...reported on April 17, 2025, markets moved higher...";
        let (date, raw) = extractor.extract(text).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 4, 17).unwrap());
        assert_eq!(raw, "April 17, 2025");
    }

    #[test]
    fn raw_string_keeps_the_year() {
        // The match must anchor on the complete triple, not stop at the
        // comma after the day.
        let extractor = PublishDateExtractor::new();
        let (_, raw) = extractor
            .extract("Published as of: May 2, 2025, 9:15 a.m. ET")
            .unwrap();
        assert_eq!(raw, "May 2, 2025");
    }

    #[test]
    fn anchors_on_publish_marker_when_present() {
        let extractor = PublishDateExtractor::new();
        let text = "Archive from January 1, 2020. Published as of: June 3, 2025 update.";
        let (date, raw) = extractor.extract(text).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 3).unwrap());
        assert_eq!(raw, "June 3, 2025");
    }

    #[test]
    fn skips_candidates_that_are_not_calendar_dates() {
        let extractor = PublishDateExtractor::new();
        let text = "Updated February 30, 2025 and again March 1, 2025.";
        let (date, raw) = extractor.extract(text).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(raw, "March 1, 2025");
    }

    #[test]
    fn fails_with_date_not_found_when_no_pattern_matches() {
        let extractor = PublishDateExtractor::new();
        let err = extractor.extract("no dates in here at all").unwrap_err();
        assert!(matches!(err, LedgerError::DateNotFound));
    }

    #[test]
    fn capitalized_word_before_number_is_not_enough() {
        let extractor = PublishDateExtractor::new();
        let err = extractor.extract("see Chapter 4, 2025 edition").unwrap_err();
        assert!(matches!(err, LedgerError::DateNotFound));
    }
}
