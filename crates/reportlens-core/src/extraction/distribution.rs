use crate::model::{BreakdownKind, DistributionEntry, Distributions};
use crate::parsing::values::parse_magnitude;
use crate::parsing::{Section, PLACEHOLDER};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// How a report introduces its breakdown tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownStyle {
    /// Heading, then a "See All" line, then rows.
    SeeAll,
    /// Any recognized heading, plus inline "Top markets: A (45%), B (12%)" lists.
    Headed,
}

/// Longest label accepted as a breakdown row.
const MAX_LABEL_CHARS: usize = 48;
const MAX_LABEL_WORDS: usize = 6;

static TRAILING_SHARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?(?P<sign>[+\-]?)(?P<pct>\d+(?:\.\d+)?)[ \t]*%\)?[ \t]*$")
        .expect("valid share regex")
});

static TRAILING_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[ \t:(\-])(?P<count>\d+(?:\.\d+)?(?:[ \t]?[KkMmBb]\b)?)[ \t]*\)?[ \t]*$")
        .expect("valid count regex")
});

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*\u{2022}][ \t]+|\d{1,2}[.)][ \t]+)").expect("valid list marker regex")
});

static INLINE_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:[-*\u{2022}][ \t]*)?(?:top[ \t]+)?(?P<kind>markets|countries|territories|regions|devices|platforms|sources|traffic[ \t]+sources|keywords|search[ \t]+terms)(?:[ \t]+by[ \t]+\w+)?[ \t]*:[ \t]*(?P<items>.+)$",
    )
    .expect("valid inline list regex")
});

static ITEM_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,]|\band\b").expect("valid item separator regex"));

/// Which breakdown a heading introduces, if any.
pub fn breakdown_kind(heading: &str) -> Option<BreakdownKind> {
    let h = heading.to_lowercase();
    if h.contains("keyword") || h.contains("search term") {
        Some(BreakdownKind::Keywords)
    } else if h.contains("device") || h.contains("platform") {
        Some(BreakdownKind::Devices)
    } else if h.contains("source") || h.contains("traffic") {
        Some(BreakdownKind::Sources)
    } else if h.contains("territor")
        || h.contains("countr")
        || h.contains("market")
        || h.contains("region")
    {
        Some(BreakdownKind::Markets)
    } else {
        None
    }
}

/// One parsed row before percentages are completed.
#[derive(Debug, Clone, Default, PartialEq)]
struct RawRow {
    label: String,
    count: Option<f64>,
    share: Option<f64>,
}

impl RawRow {
    fn has_numbers(&self) -> bool {
        self.count.is_some() || self.share.is_some()
    }
}

/// Split a line into an optional label, count and share.
/// A share with an explicit sign is a period-over-period change and is dropped.
fn split_row(line: &str) -> (Option<String>, Option<f64>, Option<f64>) {
    let mut rest = LIST_MARKER.replace(line.trim(), "").to_string();

    let mut share = None;
    if let Some(caps) = TRAILING_SHARE.captures(&rest) {
        let signed = !caps["sign"].is_empty();
        let pct = caps["pct"].parse::<f64>().ok();
        let start = caps.get(0).map_or(rest.len(), |m| m.start());
        if !signed {
            share = pct;
        }
        rest.truncate(start);
    }

    let mut count = None;
    if let Some(caps) = TRAILING_COUNT.captures(&rest) {
        if let Some(m) = caps.name("count") {
            let start = m.start();
            count = parse_magnitude(m.as_str()).ok();
            rest.truncate(start);
        }
    }

    let label = rest
        .trim()
        .trim_end_matches(|c: char| matches!(c, ':' | '-' | '\u{2013}' | '(' | '='))
        .trim();
    let label = is_label(label).then(|| label.to_string());
    (label, count, share)
}

fn is_label(s: &str) -> bool {
    !s.is_empty()
        && s.chars().any(|c| c.is_alphabetic())
        && s.chars().count() <= MAX_LABEL_CHARS
        && s.split_whitespace().count() <= MAX_LABEL_WORDS
        && !s.ends_with('.')
}

fn is_see_all(line: &str) -> bool {
    let l = line.trim().to_lowercase();
    l == "see all" || l == "view all" || l == "show all" || l == "see all >"
}

/// Rows of one section body. Handles one-line rows ("Germany 812 8%") and
/// label / value / share rows spread over consecutive lines.
fn parse_rows(lines: &[&str]) -> Vec<RawRow> {
    let mut rows = Vec::new();
    let mut pending: Option<RawRow> = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() || is_see_all(line) {
            continue;
        }
        // A placeholder line starts a metric block; the table has ended.
        if line == PLACEHOLDER {
            pending = None;
            break;
        }

        match split_row(line) {
            (Some(label), count, share) if count.is_some() || share.is_some() => {
                rows.extend(pending.take().filter(RawRow::has_numbers));
                rows.push(RawRow {
                    label,
                    count,
                    share,
                });
            }
            (Some(label), None, None) => {
                rows.extend(pending.take().filter(RawRow::has_numbers));
                pending = Some(RawRow {
                    label,
                    ..RawRow::default()
                });
            }
            (None, count, share) => {
                if let Some(row) = pending.as_mut() {
                    if row.count.is_none() {
                        row.count = count;
                    }
                    if row.share.is_none() {
                        row.share = share;
                    }
                }
            }
            _ => {}
        }
    }

    rows.extend(pending.filter(RawRow::has_numbers));
    rows
}

/// Fill missing shares from counts, then order by count, then share.
fn finish(rows: Vec<RawRow>) -> Vec<DistributionEntry> {
    let total: f64 = rows.iter().filter_map(|r| r.count).sum();
    let mut entries: Vec<DistributionEntry> = rows
        .into_iter()
        .map(|r| {
            let count = r.count.unwrap_or(0.0);
            let percentage = match r.share {
                Some(p) => p,
                None if total > 0.0 => (count / total * 1000.0).round() / 10.0,
                None => 0.0,
            };
            DistributionEntry {
                label: r.label,
                percentage,
                count,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.count
            .total_cmp(&a.count)
            .then(b.percentage.total_cmp(&a.percentage))
    });
    entries
}

/// Extract breakdown tables from a report's sections.
/// The first section of each kind wins.
pub fn extract_distributions(
    text: &str,
    sections: &[Section<'_>],
    style: BreakdownStyle,
) -> Distributions {
    let mut distributions = Distributions::default();

    for section in sections {
        let Some(kind) = section.heading.and_then(breakdown_kind) else {
            continue;
        };
        if !distributions.list(kind).is_empty() {
            continue;
        }

        let mut body = section.lines.as_slice();
        if style == BreakdownStyle::SeeAll {
            match body.iter().position(|l| !l.trim().is_empty()) {
                Some(i) if is_see_all(body[i]) => body = &body[i + 1..],
                _ => continue,
            }
        }

        let entries = finish(parse_rows(body));
        tracing::debug!(%kind, rows = entries.len(), "Breakdown section parsed");
        *distributions.list_mut(kind) = entries;
    }

    if style == BreakdownStyle::Headed {
        for caps in INLINE_LIST.captures_iter(text) {
            let Some(kind) = breakdown_kind(&caps["kind"]) else {
                continue;
            };
            if !distributions.list(kind).is_empty() {
                continue;
            }
            let rows: Vec<RawRow> = ITEM_SEPARATOR
                .split(&caps["items"])
                .filter_map(|item| match split_row(item) {
                    (Some(label), count, share) if count.is_some() || share.is_some() => {
                        Some(RawRow {
                            label,
                            count,
                            share,
                        })
                    }
                    _ => None,
                })
                .collect();
            *distributions.list_mut(kind) = finish(rows);
        }
    }

    distributions
}
