// src/consolidate/format.rs
//! Display strings for dataset values.

/// `"LKR 120.50 Mn"`
pub fn currency(value: f64, code: &str) -> String {
    format!("{} {:.2} Mn", code, value / 1_000_000.0)
}

/// `"33.33%"`
pub fn percentage(value: f64) -> String {
    format!("{:.2}%", value)
}

/// `"7.25"`
pub fn per_share(value: f64) -> String {
    format!("{:.2}", value)
}

/// `"128,917,111"`; fractional shares are truncated.
pub fn share_count(value: f64) -> String {
    let whole = value.trunc() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats() {
        assert_eq!(currency(120_500_000.0, "LKR"), "LKR 120.50 Mn");
        assert_eq!(currency(100_000.0, "USD"), "USD 0.10 Mn");
        assert_eq!(percentage(33.333), "33.33%");
        assert_eq!(per_share(7.0), "7.00");
        assert_eq!(share_count(128_917_111.0), "128,917,111");
        assert_eq!(share_count(999.9), "999");
        assert_eq!(share_count(1_000.0), "1,000");
        assert_eq!(share_count(-45_000.0), "-45,000");
    }
}
