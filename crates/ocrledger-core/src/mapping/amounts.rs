//! Amount normalization for provider currency strings.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Everything that is not a digit or a decimal point.
    static ref NON_AMOUNT: Regex = Regex::new(r"[^\d.]").unwrap();
}

/// Strip a provider amount string down to digits and the decimal point.
///
/// The result is kept as a string: amounts never pass through a float
/// inside the pipeline, so no precision is lost. An empty result means
/// the field did not contain an amount at all; the caller treats that as
/// an extraction failure, not a zero.
pub fn normalize_amount(raw: &str) -> String {
    NON_AMOUNT.replace_all(raw, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn currency_decorations_are_stripped() {
        assert_eq!(normalize_amount("¥1,234.56元"), "1234.56");
        assert_eq!(normalize_amount("CNY 42.00"), "42.00");
        assert_eq!(normalize_amount("339.00"), "339.00");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["¥1,234.56元", "1234.56", "", "abc", "1.2.3"] {
            let once = normalize_amount(raw);
            assert_eq!(normalize_amount(&once), once);
        }
    }

    #[test]
    fn amountless_strings_become_empty() {
        assert_eq!(normalize_amount("无"), "");
        assert_eq!(normalize_amount(""), "");
    }
}
