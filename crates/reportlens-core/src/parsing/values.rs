use crate::error::ReportError;
use regex::Regex;
use std::sync::LazyLock;

static PERCENT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([+\-]?)\s*(\d+(?:\.\d+)?)\s*%").expect("valid percent regex")
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+\-]?)\s*(\d+(?:\.\d+)?)").expect("valid number regex"));

static DECREASE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:decrease[sd]?|decline[sd]?|drop(?:s|ped)?|fell|falls?|down|lower|reduc(?:ed|tion))\b|[\u{2193}\u{25BC}\u{25BE}]",
    )
    .expect("valid decrease regex")
});

const SUFFIXES: &[(&str, f64)] = &[
    ("thousand", 1_000.0),
    ("million", 1_000_000.0),
    ("billion", 1_000_000_000.0),
    ("k", 1_000.0),
    ("m", 1_000_000.0),
    ("b", 1_000_000_000.0),
];

/// Parse a textual magnitude into a number.
///
/// Handles formats like:
/// - "10,245" -> 10245
/// - "$1,234.56" -> 1234.56
/// - "2.91M" -> 2910000
/// - "1.2k" -> 1200
/// - "3 billion" -> 3000000000
/// - "4.5%" -> 4.5 (the percent sign is dropped, not applied)
pub fn parse_magnitude(s: &str) -> Result<f64, ReportError> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '\u{20AC}' | '\u{00A3}' | '\u{00A5}' | ',') && !c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim_end_matches('%').to_lowercase();

    if cleaned.is_empty() {
        return Err(ReportError::invalid_number(s, "empty"));
    }

    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| cleaned.strip_suffix(suffix).map(|n| (n, *mult)))
        .unwrap_or((cleaned.as_str(), 1.0));

    if !number
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return Err(ReportError::invalid_number(s, "not a number"));
    }

    let value: f64 = number
        .parse()
        .map_err(|e: std::num::ParseFloatError| ReportError::invalid_number(s, e.to_string()))?;
    let scaled = value * multiplier;
    if !scaled.is_finite() {
        return Err(ReportError::invalid_number(s, "not finite"));
    }
    Ok(scaled)
}

/// Parse a percentage change, normalizing its sign.
///
/// An explicit `+`/`-` in front of the number wins. Otherwise decrease words
/// ("decreased", "fell", "down") and down arrows make it negative, and
/// everything else is positive:
/// - "+12%" -> 12
/// - "(-3.5%)" -> -3.5
/// - "decreased by 8%" -> -8
/// - "(an increase of 4%)" -> 4
pub fn parse_signed_percent(s: &str) -> Result<f64, ReportError> {
    let caps = PERCENT_NUMBER
        .captures(s)
        .or_else(|| BARE_NUMBER.captures(s))
        .ok_or_else(|| ReportError::invalid_number(s, "no percentage found"))?;

    let magnitude: f64 = caps[2]
        .parse()
        .map_err(|e: std::num::ParseFloatError| ReportError::invalid_number(s, e.to_string()))?;

    let signed = match &caps[1] {
        "-" => -magnitude,
        "+" => magnitude,
        _ if DECREASE_WORDS.is_match(s) => -magnitude,
        _ => magnitude,
    };
    Ok(signed)
}

/// Format a magnitude with a K/M/B suffix.
///
/// Three decimals are kept so that [`parse_magnitude`] gets the value back
/// within 0.1%.
pub fn format_magnitude(value: f64) -> String {
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1_000_000_000.0 {
        (value / 1_000_000_000.0, "B")
    } else if abs >= 1_000_000.0 {
        (value / 1_000_000.0, "M")
    } else if abs >= 1_000.0 {
        (value / 1_000.0, "K")
    } else {
        return format!("{value}");
    };

    let text = format!("{scaled:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= b.abs() * 0.001
    }

    #[test]
    fn plain_integer() {
        assert_eq!(parse_magnitude("10245").unwrap(), 10245.0);
    }

    #[test]
    fn commas_and_currency() {
        assert_eq!(parse_magnitude("$1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_magnitude("\u{20AC} 99").unwrap(), 99.0);
    }

    #[test]
    fn suffixes_are_case_insensitive() {
        assert_eq!(parse_magnitude("2.91M").unwrap(), 2_910_000.0);
        assert_eq!(parse_magnitude("1.2k").unwrap(), 1200.0);
        assert_eq!(parse_magnitude("3B").unwrap(), 3_000_000_000.0);
        assert_eq!(parse_magnitude("3 billion").unwrap(), 3_000_000_000.0);
    }

    #[test]
    fn percent_sign_is_dropped() {
        assert_eq!(parse_magnitude("4.5%").unwrap(), 4.5);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_magnitude("").is_err());
        assert!(parse_magnitude("abc").is_err());
        assert!(parse_magnitude("inf").is_err());
        assert!(parse_magnitude("NaN").is_err());
    }

    #[test]
    fn signed_percent_explicit_sign() {
        assert_eq!(parse_signed_percent("+12%").unwrap(), 12.0);
        assert_eq!(parse_signed_percent("(-3.5%)").unwrap(), -3.5);
        assert_eq!(parse_signed_percent("7%").unwrap(), 7.0);
    }

    #[test]
    fn signed_percent_sentence_forms() {
        assert_eq!(parse_signed_percent("decreased by 8%").unwrap(), -8.0);
        assert_eq!(parse_signed_percent("increased by 8%").unwrap(), 8.0);
        assert_eq!(parse_signed_percent("(an increase of 4%)").unwrap(), 4.0);
        assert_eq!(parse_signed_percent("(a decrease of 4%)").unwrap(), -4.0);
        assert_eq!(parse_signed_percent("\u{2193} 2%").unwrap(), -2.0);
    }

    #[test]
    fn explicit_sign_beats_words() {
        assert_eq!(parse_signed_percent("decreased by +8%").unwrap(), 8.0);
    }

    #[test]
    fn signed_percent_without_number_is_error() {
        assert!(parse_signed_percent("flat").is_err());
    }

    #[test]
    fn format_uses_suffixes() {
        assert_eq!(format_magnitude(2_910_000.0), "2.91M");
        assert_eq!(format_magnitude(1500.0), "1.5K");
        assert_eq!(format_magnitude(3_000_000_000.0), "3B");
        assert_eq!(format_magnitude(42.0), "42");
    }

    #[test]
    fn magnitude_round_trip_within_tolerance() {
        let samples = [
            1.0, 999.0, 1_000.0, 1_234.0, 10_245.0, 99_999.0, 1_004_900.0, 2_910_000.0,
            123_456_789.0, 1_004_900_000.0, 7_777_777_777.0,
        ];
        for v in samples {
            let back = parse_magnitude(&format_magnitude(v)).unwrap();
            assert!(close(back, v), "{v} -> {} -> {back}", format_magnitude(v));
        }
    }
}
