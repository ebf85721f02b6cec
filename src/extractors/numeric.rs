// src/extractors/numeric.rs
//! Locale-formatted numeric text to signed values.

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"));

/// Parses a statement cell such as `"(1,234.50)"` or `"LKR 1,000,000"`.
///
/// Currency markers, spaces and thousands separators are dropped, a value in
/// parentheses is negated and the first signed decimal number wins. Returns
/// `None` when nothing numeric is left, which callers must keep distinct
/// from zero.
pub fn parse(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let negative = text.contains('(') && text.contains(')');

    // Keep digits, the decimal point and minus signs; everything else is a
    // currency code, symbol, separator or footnote marker.
    let cleaned: String = text
        .chars()
        .map(|c| if c == '−' { '-' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let token = NUMBER_RE.find(&cleaned)?.as_str();
    let value: f64 = token.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value.abs() } else { value })
}

/// True when the cell holds nothing but a number (with optional currency,
/// sign, parentheses or percent sign).
pub fn is_numeric_cell(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || parse(trimmed).is_none() {
        return false;
    }
    let letters = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    // "Rs. 12.50" and "LKR 1,000" still count as numeric
    letters <= 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parentheses_negate() {
        assert_eq!(parse("(1,234.50)"), Some(-1234.50));
        assert_eq!(parse("( 70,000 )"), Some(-70000.0));
    }

    #[test]
    fn currency_and_separators_stripped() {
        assert_eq!(parse("LKR 1,000,000"), Some(1_000_000.0));
        assert_eq!(parse("Rs. 12.75"), Some(12.75));
        assert_eq!(parse("9.31%"), Some(9.31));
        assert_eq!(parse("128 917 111"), Some(128_917_111.0));
    }

    #[test]
    fn absent_is_not_zero() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
        assert_eq!(parse("-"), None);
        assert_eq!(parse("–"), None);
        assert_eq!(parse("N/A"), None);
        assert_eq!(parse("0"), Some(0.0));
    }

    #[test]
    fn signs() {
        assert_eq!(parse("-45.5"), Some(-45.5));
        assert_eq!(parse("−12"), Some(-12.0));
    }

    #[test]
    fn numeric_cells() {
        assert!(is_numeric_cell("1,234"));
        assert!(is_numeric_cell("LKR 1,000"));
        assert!(is_numeric_cell("(500)"));
        assert!(!is_numeric_cell("Melstacorp PLC"));
        assert!(!is_numeric_cell("Revenue 2020"));
        assert!(!is_numeric_cell(""));
    }
}
