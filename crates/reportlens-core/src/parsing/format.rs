use crate::parsing::PLACEHOLDER;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Layout of a pasted report, decided by counting signature phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    AppStoreConnect,
    Narrative,
    Unknown,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::AppStoreConnect => write!(f, "app_store_connect"),
            ReportFormat::Narrative => write!(f, "narrative"),
            ReportFormat::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSniff {
    pub format: ReportFormat,
    pub app_store_score: usize,
    pub narrative_score: usize,
}

const APP_STORE_SIGNATURES: &[&str] = &[
    "app store connect",
    "see all",
    "product page views",
    "first-time downloads",
    "sessions per active device",
    "app units",
    "impressions (unique devices)",
    "territories",
    "source type",
    "app analytics",
];

const NARRATIVE_SIGNATURES: &[&str] = &[
    "executive summary",
    "technical performance",
    "key metrics",
    "increased by",
    "decreased by",
    "compared to",
    "recommendation",
    "an increase of",
    "a decrease of",
];

/// Each placeholder line or inline pair counts once, up to this many.
const STRUCTURAL_CAP: usize = 5;

static INLINE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[-*\u{2022}]?\s*[A-Za-z][A-Za-z /&-]{2,40}:\s*[$\u{20AC}\u{00A3}]?\d")
        .expect("valid inline pair regex")
});

/// Decide which layout the normalized text most resembles.
pub fn sniff_format(text: &str) -> FormatSniff {
    let lower = text.to_lowercase();

    let placeholder_lines = text
        .lines()
        .filter(|l| l.trim() == PLACEHOLDER)
        .count()
        .min(STRUCTURAL_CAP);
    let app_store_score = count_signatures(&lower, APP_STORE_SIGNATURES) + placeholder_lines;

    let inline_pairs = INLINE_PAIR.find_iter(text).count().min(STRUCTURAL_CAP);
    let narrative_score = count_signatures(&lower, NARRATIVE_SIGNATURES) + inline_pairs;

    let format = if app_store_score == 0 && narrative_score == 0 {
        ReportFormat::Unknown
    } else if app_store_score > narrative_score {
        ReportFormat::AppStoreConnect
    } else {
        ReportFormat::Narrative
    };

    tracing::debug!(
        %format,
        app_store_score,
        narrative_score,
        "Sniffed report format"
    );

    FormatSniff {
        format,
        app_store_score,
        narrative_score,
    }
}

fn count_signatures(lower: &str, signatures: &[&str]) -> usize {
    signatures.iter().filter(|s| lower.contains(*s)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_store_layout_detected() {
        let text = "App Store Connect\nImpressions\n?\n2.91M\n+12%\nProduct Page Views\n?\n120K";
        let sniff = sniff_format(text);
        assert_eq!(sniff.format, ReportFormat::AppStoreConnect);
        assert!(sniff.app_store_score > sniff.narrative_score);
    }

    #[test]
    fn narrative_layout_detected() {
        let text = "Executive Summary\nDownloads: 10245 (+12%)\nSessions: 5000\nRevenue increased by 4%.";
        assert_eq!(sniff_format(text).format, ReportFormat::Narrative);
    }

    #[test]
    fn unrecognizable_text_is_unknown() {
        assert_eq!(sniff_format("hello world").format, ReportFormat::Unknown);
    }

    #[test]
    fn tie_prefers_narrative() {
        // one signature each
        let text = "See All\nExecutive Summary";
        assert_eq!(sniff_format(text).format, ReportFormat::Narrative);
    }
}
