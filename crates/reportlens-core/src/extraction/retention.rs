use crate::model::{RetentionCurve, RetentionDay};
use regex::Regex;
use std::sync::LazyLock;

/// "Day 7: 18%", "D7 retention 18% (benchmark 15%)", and the block form
/// "Day 7\n?\n18%".
static RETENTION_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:day[ \t\-]?|d)(?P<day>1|7|14|28)\b(?:[ \t]+retention)?(?:[ \t]+(?:was|is|at|of))?[ \t]*[:=\-]?[ \t]*(?:\n[ \t]*\?[ \t]*)?\n?[ \t]*(?P<value>\d+(?:\.\d+)?)[ \t]*%(?:[ \t]*\(?(?:benchmark|peers?(?:[ \t]+median)?|industry(?:[ \t]+average)?|vs\.?|avg\.?)[ \t]*:?[ \t]*(?P<benchmark>\d+(?:\.\d+)?)[ \t]*%\)?)?",
    )
    .expect("valid retention regex")
});

/// Extract day 1/7/14/28 retention. The first mention of each day wins.
pub fn extract_retention(text: &str) -> RetentionCurve {
    let mut curve = RetentionCurve::default();

    for caps in RETENTION_POINT.captures_iter(text) {
        let Some(day) = caps["day"].parse().ok().and_then(RetentionDay::from_days) else {
            continue;
        };
        if curve.get(day).present {
            continue;
        }
        let Ok(value) = caps["value"].parse::<f64>() else {
            continue;
        };
        let benchmark = caps
            .name("benchmark")
            .and_then(|b| b.as_str().parse::<f64>().ok());
        curve.set(day, value, benchmark);
    }

    if !curve.is_empty() {
        tracing::debug!(days = curve.present().len(), "Retention curve extracted");
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_days() {
        let curve = extract_retention("Day 1: 42%\nDay 7: 18.5%\nDay 28: 6%");
        assert_eq!(curve.day1.value, 42.0);
        assert_eq!(curve.day7.value, 18.5);
        assert!(!curve.day14.present);
        assert_eq!(curve.day28.value, 6.0);
    }

    #[test]
    fn short_form_with_benchmark() {
        let curve = extract_retention("D7 retention 18% (benchmark 15%)");
        assert_eq!(curve.day7.value, 18.0);
        assert_eq!(curve.day7.benchmark, 15.0);
    }

    #[test]
    fn block_form() {
        let curve = extract_retention("Day 14\n?\n11%");
        assert_eq!(curve.day14.value, 11.0);
        assert!(curve.day14.present);
    }

    #[test]
    fn sentence_form() {
        let curve = extract_retention("Day-1 retention was 40%, above peers.");
        assert_eq!(curve.day1.value, 40.0);
    }

    #[test]
    fn first_mention_wins() {
        let curve = extract_retention("Day 1: 40%\nLater we saw Day 1: 50%");
        assert_eq!(curve.day1.value, 40.0);
    }

    #[test]
    fn other_days_ignored() {
        let curve = extract_retention("Day 3: 30%\nAndroid 14: 25%");
        assert!(curve.is_empty());
    }
}
