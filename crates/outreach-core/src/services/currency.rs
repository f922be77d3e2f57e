//! Dollar amount formatting for letters and lenient parsing of stored values

/// Format as `$1,234.56`; missing values render as `$0.00`
pub fn format_currency(value: Option<f64>) -> String {
    let value = match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    };

    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}.{:02}", if negative { "-" } else { "" }, grouped, fraction)
}

/// Parse values such as `"$1,234.50"`, `"1234"` or `" 99.9 "`
pub fn parse_currency(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Some(1234.56)), "$1,234.56");
        assert_eq!(format_currency(Some(1_000_000.0)), "$1,000,000.00");
        assert_eq!(format_currency(Some(999.999)), "$1,000.00");
        assert_eq!(format_currency(Some(12.5)), "$12.50");
        assert_eq!(format_currency(None), "$0.00");
        assert_eq!(format_currency(Some(-42.0)), "-$42.00");
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("$1,234.50"), Some(1234.5));
        assert_eq!(parse_currency("1234"), Some(1234.0));
        assert_eq!(parse_currency("  $ 99.90 "), Some(99.9));
        assert_eq!(parse_currency("n/a"), None);
        assert_eq!(parse_currency(""), None);
    }
}
