use crate::model::{ReportSummary, NOT_SPECIFIED};
use crate::parsing::{Section, PLACEHOLDER};
use regex::Regex;
use std::sync::LazyLock;

/// Longest executive summary kept, in characters.
const MAX_SUMMARY_CHARS: usize = 1200;

const MONTH: &str = r"(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?";

static DATE_RANGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(
            r"(?i)\b{MONTH}\s+\d{{1,2}}(?:,?\s*\d{{4}})?\s*(?:-|\u{{2013}}|\u{{2014}}|to|through)\s*(?:{MONTH}\s+)?\d{{1,2}},?\s*\d{{4}}"
        ),
        r"\b\d{4}-\d{2}-\d{2}\s*(?:-|\u{2013}|to)\s*\d{4}-\d{2}-\d{2}\b".to_string(),
        r"\b\d{1,2}/\d{1,2}/\d{2,4}\s*(?:-|\u{2013}|to)\s*\d{1,2}/\d{1,2}/\d{2,4}\b".to_string(),
        r"(?i)\b(?:last|past|previous)\s+\d+\s+(?:days|weeks|months)\b".to_string(),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid date range regex"))
    .collect()
});

static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d[\d.]*\s*[KkMmBb%]?\s*(?:\([^)]*\))?\s*$").expect("valid trailing number regex")
});

static LABELLED_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":\s*[$\u{20AC}\u{00A3}+\-]?\d").expect("valid labelled number regex")
});

/// Summary fields found in a report; `None` where nothing was found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSummary {
    pub title: Option<String>,
    pub date_range: Option<String>,
    pub executive_summary: Option<String>,
}

impl PartialSummary {
    /// Fill gaps in `self` from `other`.
    pub fn merge_from(&mut self, other: &PartialSummary) {
        if self.title.is_none() {
            self.title = other.title.clone();
        }
        if self.date_range.is_none() {
            self.date_range = other.date_range.clone();
        }
        if self.executive_summary.is_none() {
            self.executive_summary = other.executive_summary.clone();
        }
    }

    pub fn into_summary(self) -> ReportSummary {
        let or_default = |v: Option<String>| v.unwrap_or_else(|| NOT_SPECIFIED.to_string());
        ReportSummary {
            title: or_default(self.title),
            date_range: or_default(self.date_range),
            executive_summary: or_default(self.executive_summary),
        }
    }
}

/// Extract title, date range and executive summary from normalized text.
pub fn parse_summary(text: &str, sections: &[Section<'_>]) -> PartialSummary {
    let lines: Vec<&str> = text.lines().collect();

    let title = lines
        .iter()
        .find_map(|l| extract_after_label(l, "report title"))
        .or_else(|| lines.iter().find_map(|l| extract_after_label(l, "title")))
        .or_else(|| first_line_title(&lines));

    let date_range = lines
        .iter()
        .find_map(|l| {
            extract_after_label(l, "date range").or_else(|| extract_after_label(l, "period"))
        })
        .or_else(|| {
            DATE_RANGE_PATTERNS
                .iter()
                .find_map(|re| re.find(text).map(|m| m.as_str().trim().to_string()))
        });

    let executive_summary = executive_summary(&lines, sections);

    PartialSummary {
        title,
        date_range,
        executive_summary,
    }
}

/// The first non-empty line, if it reads like a title rather than a metric.
fn first_line_title(lines: &[&str]) -> Option<String> {
    let (idx, line) = lines
        .iter()
        .enumerate()
        .find(|(_, l)| !l.trim().is_empty())?;
    let next_is_placeholder = lines
        .get(idx + 1)
        .map(|n| n.trim() == PLACEHOLDER)
        .unwrap_or(false);

    let candidate = line.trim().trim_start_matches('#').trim();
    if next_is_placeholder
        || candidate.len() > 100
        || candidate.ends_with(':')
        || !candidate.chars().any(|c| c.is_alphabetic())
        || TRAILING_NUMBER.is_match(candidate)
        || LABELLED_NUMBER.is_match(candidate)
    {
        return None;
    }
    Some(candidate.to_string())
}

fn executive_summary(lines: &[&str], sections: &[Section<'_>]) -> Option<String> {
    let inline = lines.iter().find_map(|l| {
        extract_after_label(l, "executive summary").or_else(|| extract_after_label(l, "summary"))
    });

    let body = inline.or_else(|| {
        sections
            .iter()
            .find(|s| {
                let h = s.heading_lower();
                h.contains("executive summary") || h == "summary" || h == "overview"
            })
            .map(|s| s.body_text())
            .filter(|b| !b.is_empty())
    })?;

    Some(body.chars().take(MAX_SUMMARY_CHARS).collect())
}

/// Extract a value appearing after a label (case-insensitive).
/// Only matches when the label starts the line and is followed by a colon.
fn extract_after_label(line: &str, label: &str) -> Option<String> {
    let trimmed = line.trim().trim_start_matches('#').trim();
    let lower = trimmed.to_lowercase();
    if !lower.starts_with(label) {
        return None;
    }
    let after = trimmed.get(label.len()..)?.trim_start();
    let value = after.strip_prefix(':')?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::split_sections;

    fn summary_of(text: &str) -> PartialSummary {
        parse_summary(text, &split_sections(text))
    }

    #[test]
    fn first_line_is_title() {
        let s = summary_of("Q3 Analytics Report\nDownloads: 100");
        assert_eq!(s.title.as_deref(), Some("Q3 Analytics Report"));
    }

    #[test]
    fn metric_line_is_not_a_title() {
        assert!(summary_of("Downloads: 10245 (+12%)").title.is_none());
        assert!(summary_of("Impressions 2.91M").title.is_none());
        assert!(summary_of("Impressions\n?\n2.91M").title.is_none());
    }

    #[test]
    fn labelled_title_wins() {
        let s = summary_of("Weekly numbers\nTitle: FitTrack Monthly Review");
        assert_eq!(s.title.as_deref(), Some("FitTrack Monthly Review"));
    }

    #[test]
    fn date_range_month_form() {
        let s = summary_of("Report\nJan 1 - Jan 31, 2024\nDownloads: 5");
        assert_eq!(s.date_range.as_deref(), Some("Jan 1 - Jan 31, 2024"));
    }

    #[test]
    fn date_range_iso_and_relative() {
        assert_eq!(
            summary_of("Period 2024-01-01 to 2024-01-31").date_range.as_deref(),
            Some("2024-01-01 to 2024-01-31")
        );
        assert_eq!(
            summary_of("Showing the last 30 days").date_range.as_deref(),
            Some("last 30 days")
        );
    }

    #[test]
    fn labelled_date_range() {
        let s = summary_of("Date Range: September 2024");
        assert_eq!(s.date_range.as_deref(), Some("September 2024"));
    }

    #[test]
    fn executive_summary_from_section() {
        let text = "Report\n## Executive Summary\nGrowth was strong.\nChurn fell.\n## Technical Performance\nCrashes: 4";
        let s = summary_of(text);
        assert_eq!(
            s.executive_summary.as_deref(),
            Some("Growth was strong. Churn fell.")
        );
    }

    #[test]
    fn executive_summary_inline() {
        let s = summary_of("Executive Summary: Installs are up.");
        assert_eq!(s.executive_summary.as_deref(), Some("Installs are up."));
    }

    #[test]
    fn defaults_to_placeholder() {
        let summary = PartialSummary::default().into_summary();
        assert_eq!(summary.title, NOT_SPECIFIED);
        assert_eq!(summary.date_range, NOT_SPECIFIED);
    }
}
