pub mod format;
pub mod normalize;
pub mod summary;
pub mod values;

pub use format::{sniff_format, FormatSniff, ReportFormat};
pub use normalize::{normalize_text, PLACEHOLDER};
pub use summary::{parse_summary, PartialSummary};
pub use values::{format_magnitude, parse_magnitude, parse_signed_percent};

/// A run of lines under one heading.
#[derive(Debug, Clone, PartialEq)]
pub struct Section<'a> {
    /// Heading text without markdown hashes or trailing colon.
    pub heading: Option<&'a str>,
    pub lines: Vec<&'a str>,
}

impl Section<'_> {
    pub fn heading_lower(&self) -> String {
        self.heading.map(str::to_lowercase).unwrap_or_default()
    }

    /// Non-empty lines joined with single spaces.
    pub fn body_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

const HEADING_KEYWORDS: &[&str] = &[
    "summary",
    "overview",
    "highlights",
    "performance",
    "territor",
    "countr",
    "market",
    "region",
    "device",
    "platform",
    "source",
    "traffic",
    "keyword",
    "search term",
    "retention",
    "engagement",
    "monetization",
    "revenue",
    "acquisition",
    "insight",
    "recommendation",
];

/// Split normalized text into sections at heading lines.
///
/// Lines before the first heading form an untitled section. A label line
/// directly followed by the `?` placeholder is an App Store Connect metric
/// label, not a heading.
pub fn split_sections(text: &str) -> Vec<Section<'_>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut sections = Vec::new();
    let mut current = Section {
        heading: None,
        lines: Vec::new(),
    };

    for (i, &line) in lines.iter().enumerate() {
        let next_is_placeholder = lines
            .get(i + 1)
            .map(|n| n.trim() == PLACEHOLDER)
            .unwrap_or(false);

        if !next_is_placeholder {
            if let Some(heading) = heading_text(line) {
                if current.heading.is_some() || !current.lines.is_empty() {
                    sections.push(current);
                }
                current = Section {
                    heading: Some(heading),
                    lines: Vec::new(),
                };
                continue;
            }
        }
        current.lines.push(line);
    }

    if current.heading.is_some() || !current.lines.is_empty() {
        sections.push(current);
    }

    sections
}

/// Return the heading text if the line looks like a section heading.
fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let hashed = trimmed.starts_with('#');
    let stripped = trimmed.trim_start_matches('#').trim();
    let colon = stripped.ends_with(':');
    let stripped = stripped.trim_end_matches(':').trim();

    if stripped.is_empty()
        || stripped.len() > 60
        || stripped == PLACEHOLDER
        || stripped.ends_with('.')
        || stripped.chars().any(|c| c.is_ascii_digit() || c == '%')
        || stripped.split_whitespace().count() > 6
    {
        return None;
    }

    let lower = stripped.to_lowercase();
    let keyword = HEADING_KEYWORDS.iter().any(|kw| lower.contains(kw));
    let letters: Vec<char> = stripped.chars().filter(|c| c.is_alphabetic()).collect();
    let all_caps = letters.len() >= 4 && letters.iter().all(|c| c.is_uppercase());

    if hashed || colon || keyword || all_caps {
        Some(stripped)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_headings_is_one_section() {
        let sections = split_sections("Downloads: 10\nSessions: 20");
        assert_eq!(sections.len(), 1);
        assert!(sections[0].heading.is_none());
        assert_eq!(sections[0].lines.len(), 2);
    }

    #[test]
    fn headings_start_sections() {
        let text = "Intro line\n## Executive Summary\nThings went well.\nTop Markets:\nUnited States: 45%";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].heading, Some("Executive Summary"));
        assert_eq!(sections[2].heading, Some("Top Markets"));
        assert_eq!(sections[2].lines, vec!["United States: 45%"]);
    }

    #[test]
    fn label_before_placeholder_is_not_a_heading() {
        let text = "Sessions per Active Device\n?\n2.5\nDevices\nSee All\niPhone 60%";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 2);
        assert!(sections[0].heading.is_none());
        assert_eq!(sections[1].heading, Some("Devices"));
    }

    #[test]
    fn lines_with_numbers_are_not_headings() {
        assert!(heading_text("Downloads: 10245").is_none());
        assert!(heading_text("Day 7 retention").is_none());
        assert_eq!(heading_text("TECHNICAL PERFORMANCE"), Some("TECHNICAL PERFORMANCE"));
    }

    #[test]
    fn body_text_joins_lines() {
        let section = Section {
            heading: Some("Executive Summary"),
            lines: vec!["First.", "", "Second."],
        };
        assert_eq!(section.body_text(), "First. Second.");
    }
}
