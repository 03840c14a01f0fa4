//! Date normalization for provider date strings.

use chrono::NaiveDate;
use tracing::warn;

/// Separator characters the provider mixes into date strings, including
/// the CJK date-unit markers. All of them are simply deleted.
const DATE_SEPARATORS: &[char] = &[
    '-', '/', '\\', '.', ':', '：', '年', '月', '日', '时', '秒', '分', ' ',
];

/// Normalize a provider date string into a calendar date.
///
/// Strips every separator, then parses the leading 8 digits as `YYYYMMDD`;
/// trailing digits (a time-of-day component) are ignored.
///
/// Returns `None` when the remainder is not parsable. The blank field is
/// surfaced to the operator for manual correction; the pipeline never
/// substitutes "today".
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let digits: String = raw
        .chars()
        .filter(|c| !DATE_SEPARATORS.contains(c))
        .collect();

    if digits.len() < 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        warn!(raw, "date string did not normalize, leaving blank");
        return None;
    }

    match NaiveDate::parse_from_str(&digits[..8], "%Y%m%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(raw, "normalized date digits are not a calendar date");
            None
        }
    }
}
