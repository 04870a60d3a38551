use crate::config::OccurrenceStrategy;
use crate::model::Field;
use crate::parsing::values::{parse_magnitude, parse_signed_percent};
use crate::rules::{FieldPatternTable, FieldRule, MatchTier, PatternShape};
use std::collections::BTreeMap;

/// One place in the text where a field's pattern matched.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub value: f64,
    pub change: f64,
    /// Byte offset of the value in the searched text.
    pub position: usize,
    pub label: String,
    pub shape: PatternShape,
}

/// Resolved match for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub field: Field,
    pub value: f64,
    pub change: f64,
    pub tier: MatchTier,
    pub occurrences: Vec<Occurrence>,
    pub warnings: Vec<String>,
}

impl FieldMatch {
    fn unmatched(field: Field, warnings: Vec<String>) -> Self {
        Self {
            field,
            value: 0.0,
            change: 0.0,
            tier: MatchTier::None,
            occurrences: Vec::new(),
            warnings,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.tier != MatchTier::None
    }
}

/// Extract one field: primary patterns first, alias patterns only if no
/// primary pattern matched anywhere.
pub fn extract_field(
    text: &str,
    field: Field,
    table: &FieldPatternTable,
    strategy: OccurrenceStrategy,
) -> FieldMatch {
    let Some(rule) = table.rule(field) else {
        return FieldMatch::unmatched(field, vec![format!("no extraction rule for '{field}'")]);
    };

    let mut warnings = Vec::new();
    for tier in [MatchTier::Primary, MatchTier::Alias] {
        let occurrences = collect_occurrences(text, rule, tier, &mut warnings);
        if occurrences.is_empty() {
            continue;
        }

        let (value, change) = resolve(&occurrences, strategy);
        tracing::debug!(
            %field,
            %tier,
            occurrences = occurrences.len(),
            value,
            "Field matched"
        );
        return FieldMatch {
            field,
            value,
            change,
            tier,
            occurrences,
            warnings,
        };
    }

    FieldMatch::unmatched(field, warnings)
}

/// Run [`extract_field`] for every field in the table; only matched fields
/// are returned.
pub fn extract_metrics(
    text: &str,
    table: &FieldPatternTable,
    strategy: OccurrenceStrategy,
) -> BTreeMap<Field, FieldMatch> {
    table
        .fields()
        .into_iter()
        .map(|field| extract_field(text, field, table, strategy))
        .filter(FieldMatch::is_matched)
        .map(|m| (m.field, m))
        .collect()
}

fn collect_occurrences(
    text: &str,
    rule: &FieldRule,
    tier: MatchTier,
    warnings: &mut Vec<String>,
) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();

    for pattern in rule.patterns(tier) {
        for caps in pattern.regex.captures_iter(text) {
            let (Some(label), Some(value)) = (caps.name("label"), caps.name("value")) else {
                continue;
            };

            if has_rejected_prefix(&text[..label.start()], &rule.reject_prefixes) {
                continue;
            }

            let parsed = match parse_magnitude(value.as_str()) {
                Ok(v) => v,
                Err(e) => {
                    warnings.push(format!("{}: {e}", rule.field));
                    continue;
                }
            };

            let change = match caps.name("change") {
                Some(c) => parse_signed_percent(c.as_str()).unwrap_or_else(|e| {
                    warnings.push(format!("{}: change ignored, {e}", rule.field));
                    0.0
                }),
                None => 0.0,
            };

            occurrences.push(Occurrence {
                value: parsed,
                change,
                position: value.start(),
                label: label.as_str().to_string(),
                shape: pattern.shape,
            });
        }
    }

    // Several labels can hit the same number ("App Units" and "Units").
    occurrences.sort_by_key(|o| o.position);
    occurrences.dedup_by_key(|o| o.position);
    occurrences
}

fn has_rejected_prefix(preceding: &str, prefixes: &[String]) -> bool {
    if prefixes.is_empty() {
        return false;
    }
    let tail: String = preceding
        .chars()
        .rev()
        .take(24)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<String>()
        .to_lowercase();
    let tail = tail.trim_end();
    prefixes.iter().any(|p| {
        tail.strip_suffix(p.as_str()).is_some_and(|before| {
            // "Store Downloads" must not trip the "re" prefix.
            !before.chars().last().is_some_and(|c| c.is_alphanumeric())
        })
    })
}

fn resolve(occurrences: &[Occurrence], strategy: OccurrenceStrategy) -> (f64, f64) {
    match strategy {
        OccurrenceStrategy::First => occurrences
            .first()
            .map(|o| (o.value, o.change))
            .unwrap_or((0.0, 0.0)),
        OccurrenceStrategy::Last => occurrences
            .last()
            .map(|o| (o.value, o.change))
            .unwrap_or((0.0, 0.0)),
        OccurrenceStrategy::Average => {
            let n = occurrences.len().max(1) as f64;
            let value = occurrences.iter().map(|o| o.value).sum::<f64>() / n;
            let change = occurrences.iter().map(|o| o.change).sum::<f64>() / n;
            (value, change)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::normalize_text;

    fn extract(text: &str, field: Field) -> FieldMatch {
        extract_field(
            &normalize_text(text),
            field,
            FieldPatternTable::builtin(),
            OccurrenceStrategy::First,
        )
    }

    #[test]
    fn inline_value_with_change() {
        let m = extract("Downloads: 10,245 (+12%)", Field::Downloads);
        assert_eq!(m.tier, MatchTier::Primary);
        assert_eq!(m.value, 10245.0);
        assert_eq!(m.change, 12.0);
    }

    #[test]
    fn missing_change_is_zero() {
        let m = extract("Impressions 2.91M", Field::Impressions);
        assert_eq!(m.value, 2_910_000.0);
        assert_eq!(m.change, 0.0);
    }

    #[test]
    fn percent_field_drops_sign() {
        let m = extract("Conversion Rate: 3.5% (-0.4%)", Field::ConversionRate);
        assert_eq!(m.value, 3.5);
        assert_eq!(m.change, -0.4);
    }

    #[test]
    fn app_store_block_layout() {
        let text = "Impressions\n?\n2.91M\n+12%\nProduct Page Views\n?\n120K\n-3%";
        let impressions = extract(text, Field::Impressions);
        assert_eq!(impressions.value, 2_910_000.0);
        assert_eq!(impressions.change, 12.0);
        let views = extract(text, Field::PageViews);
        assert_eq!(views.value, 120_000.0);
        assert_eq!(views.change, -3.0);
        assert_eq!(views.occurrences[0].shape, PatternShape::Block);
    }

    #[test]
    fn sentence_form() {
        let m = extract("Proceeds decreased by 8% to $1,200 this month.", Field::Proceeds);
        assert_eq!(m.value, 1200.0);
        assert_eq!(m.change, -8.0);
    }

    #[test]
    fn currency_value() {
        let m = extract("Proceeds: $12,345.67 (an increase of 4%)", Field::Proceeds);
        assert_eq!(m.value, 12345.67);
        assert_eq!(m.change, 4.0);
    }

    #[test]
    fn alias_used_only_without_primary() {
        let m = extract("Installs: 900", Field::Downloads);
        assert_eq!(m.tier, MatchTier::Alias);
        assert_eq!(m.value, 900.0);

        let m = extract("Installs: 900\nDownloads: 800", Field::Downloads);
        assert_eq!(m.tier, MatchTier::Primary);
        assert_eq!(m.value, 800.0);
    }

    #[test]
    fn trailing_form_is_alias_tier() {
        let m = extract("We saw 4.2K downloads (+8%) last week", Field::Downloads);
        assert_eq!(m.tier, MatchTier::Alias);
        assert_eq!(m.value, 4200.0);
        assert_eq!(m.change, 8.0);
    }

    #[test]
    fn rejected_prefix_skips_match() {
        let m = extract("First-Time Downloads: 500\nTotal Downloads: 800", Field::Downloads);
        assert_eq!(m.value, 800.0);
        assert_eq!(m.occurrences.len(), 1);
    }

    #[test]
    fn sessions_not_confused_with_sessions_per_device() {
        let text = "Sessions per Active Device: 2.5\nSessions: 12K";
        assert_eq!(extract(text, Field::Sessions).value, 12_000.0);
        assert_eq!(extract(text, Field::SessionsPerDevice).value, 2.5);
    }

    #[test]
    fn redownloads_label_does_not_fill_downloads() {
        let text = "Re-downloads: 50\nDownloads: 800";
        let m = extract(text, Field::Downloads);
        assert_eq!(m.value, 800.0);
        assert_eq!(m.occurrences.len(), 1);
        assert_eq!(extract(text, Field::Redownloads).value, 50.0);

        assert!(!extract("Re-downloads: 50", Field::Downloads).is_matched());
        assert!(!extract("We saw 40 re-downloads", Field::Downloads).is_matched());
    }

    #[test]
    fn reject_prefix_needs_a_word_start() {
        let m = extract("App Store Downloads: 700", Field::Downloads);
        assert_eq!(m.value, 700.0);
    }

    #[test]
    fn average_sessions_is_not_a_session_count() {
        let m = extract("Avg. Sessions: 3.2\nActive Devices: 1000", Field::Sessions);
        assert!(!m.is_matched());
        assert!(!extract("Average Sessions: 3.2", Field::Sessions).is_matched());
        assert_eq!(extract("Avg. Sessions: 3.2", Field::SessionsPerDevice).value, 3.2);
    }

    #[test]
    fn unmatched_field() {
        let m = extract("nothing here", Field::Crashes);
        assert_eq!(m.tier, MatchTier::None);
        assert_eq!(m.value, 0.0);
        assert!(!m.is_matched());
    }

    #[test]
    fn occurrence_strategies() {
        let text = normalize_text("Downloads: 100 (+10%)\nDetails\nDownloads: 300 (+20%)");
        let table = FieldPatternTable::builtin();
        let first = extract_field(&text, Field::Downloads, table, OccurrenceStrategy::First);
        let last = extract_field(&text, Field::Downloads, table, OccurrenceStrategy::Last);
        let avg = extract_field(&text, Field::Downloads, table, OccurrenceStrategy::Average);
        assert_eq!(first.value, 100.0);
        assert_eq!(last.value, 300.0);
        assert_eq!(avg.value, 200.0);
        assert_eq!(avg.change, 15.0);
    }

    #[test]
    fn same_number_hit_by_two_labels_counts_once() {
        let m = extract("App Units: 500", Field::Downloads);
        assert_eq!(m.occurrences.len(), 1);
    }

    #[test]
    fn extract_metrics_only_returns_matches() {
        let text = normalize_text("Downloads: 10\nCrashes: 2");
        let matches = extract_metrics(&text, FieldPatternTable::builtin(), OccurrenceStrategy::First);
        assert_eq!(matches.len(), 2);
        assert!(matches.contains_key(&Field::Downloads));
        assert!(matches.contains_key(&Field::Crashes));
    }
}
