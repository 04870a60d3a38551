use crate::config::SelectionPolicy;
use crate::derive::fill_derived_with;
use crate::extraction::{PartialResult, ReportExtractor};
use crate::model::{BreakdownKind, Field, MetricSet};
use crate::validate::{ValidationReport, Validator};
use std::collections::BTreeMap;

/// One extractor's output after scoring, derivation and validation.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Extractor name, or contributors joined by `+` after a merge.
    pub extractor: String,
    pub baseline: u8,
    pub partial: PartialResult,
    /// Extractor that supplied each matched field.
    pub origins: BTreeMap<Field, String>,
    /// Known metrics only: extracted plus derived.
    pub metrics: MetricSet,
    pub report: ValidationReport,
    pub score: u8,
}

impl Candidate {
    pub fn build(
        extractor: &dyn ReportExtractor,
        partial: PartialResult,
        validator: &Validator<'_>,
    ) -> Self {
        let origins = partial
            .matches
            .keys()
            .map(|f| (*f, extractor.name().to_string()))
            .collect();
        Self::assess(
            extractor.name().to_string(),
            extractor.confidence_baseline(),
            partial,
            origins,
            |metrics, partial| extractor.validate(metrics, partial, validator),
            validator,
        )
    }

    fn assess(
        name: String,
        baseline: u8,
        partial: PartialResult,
        origins: BTreeMap<Field, String>,
        validate: impl FnOnce(&MetricSet, &PartialResult) -> ValidationReport,
        validator: &Validator<'_>,
    ) -> Self {
        let scored = validator.score_matches(&partial.matches);
        let metrics = fill_derived_with(&scored, validator);
        let report = validate(&metrics, &partial);
        let score = report.score(baseline);
        Self {
            extractor: name,
            baseline,
            partial,
            origins,
            metrics,
            report,
            score,
        }
    }

    /// Content present and, when there are metrics, confident enough.
    pub fn passes(&self, min_confidence: u8) -> bool {
        self.partial.has_content()
            && (self.metrics.known_count() == 0 || self.report.overall_confidence >= min_confidence)
    }

    /// Why the candidate failed [`Candidate::passes`].
    pub fn rejection_reason(&self, min_confidence: u8) -> String {
        if !self.partial.has_content() {
            format!("{}: no metrics, breakdowns or retention found", self.extractor)
        } else {
            format!(
                "{}: overall confidence {} below minimum {}",
                self.extractor, self.report.overall_confidence, min_confidence
            )
        }
    }

    /// `"<extractor>/<tier>"` for every known field.
    pub fn field_sources(&self) -> BTreeMap<String, String> {
        self.metrics
            .known()
            .map(|(field, metric)| {
                let source = match (metric.extracted, self.partial.matches.get(&field)) {
                    (true, Some(m)) => {
                        let origin = self.origins.get(&field).unwrap_or(&self.extractor);
                        format!("{origin}/{}", m.tier)
                    }
                    _ => format!("{}/derived", self.extractor),
                };
                (field.key().to_string(), source)
            })
            .collect()
    }
}

/// Pick among passing candidates, which are in run order.
pub fn select(
    policy: SelectionPolicy,
    passing: Vec<Candidate>,
    validator: &Validator<'_>,
) -> Option<Candidate> {
    match policy {
        SelectionPolicy::FirstSuccess => passing.into_iter().next(),
        SelectionPolicy::HighestConfidence => highest(passing),
        SelectionPolicy::Merge => merge(passing, validator),
    }
}

/// Best combined score; the earlier candidate wins a tie.
fn highest(passing: Vec<Candidate>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for candidate in passing {
        if best.as_ref().map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }
    best
}

/// Fill gaps in the best candidate from the others, in score order, then
/// derive and validate the merged data once more.
fn merge(mut passing: Vec<Candidate>, validator: &Validator<'_>) -> Option<Candidate> {
    if passing.len() <= 1 {
        return passing.into_iter().next();
    }
    // stable: equal scores keep run order
    passing.sort_by(|a, b| b.score.cmp(&a.score));

    let mut others = passing.into_iter();
    let base = others.next()?;
    let baseline = base.baseline;
    let mut contributors = vec![base.extractor.clone()];
    let mut partial = base.partial;
    let mut origins = base.origins;

    for other in others {
        let mut contributed = false;

        for (field, m) in other.partial.matches {
            if let std::collections::btree_map::Entry::Vacant(slot) = partial.matches.entry(field) {
                slot.insert(m);
                origins.insert(
                    field,
                    other.origins.get(&field).cloned().unwrap_or_else(|| other.extractor.clone()),
                );
                contributed = true;
            }
        }

        for kind in BreakdownKind::ALL {
            let theirs = other.partial.distributions.list(kind);
            if partial.distributions.list(kind).is_empty() && !theirs.is_empty() {
                *partial.distributions.list_mut(kind) = theirs.clone();
                contributed = true;
            }
        }

        for (day, point) in other.partial.retention.present() {
            if !partial.retention.get(day).present {
                partial.retention.set(day, point.value, Some(point.benchmark));
                contributed = true;
            }
        }

        partial.summary.merge_from(&other.partial.summary);
        partial.warnings.extend(other.partial.warnings);

        if contributed {
            contributors.push(other.extractor);
        }
    }

    let name = contributors.join("+");
    tracing::debug!(extractor = %name, "Merged candidates");
    Some(Candidate::assess(
        name,
        baseline,
        partial,
        origins,
        |metrics, partial| {
            validator.validate(metrics, &partial.distributions, &partial.retention)
        },
        validator,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OccurrenceStrategy, PipelineConfig};
    use crate::extraction::{ExtractionContext, ExtractorProfile, StructuredExtractor};
    use crate::parsing::{normalize_text, split_sections};
    use crate::rules::FieldPatternTable;

    fn candidate(profile: ExtractorProfile, raw: &str, validator: &Validator<'_>) -> Candidate {
        let extractor = StructuredExtractor::new(profile);
        let text = normalize_text(raw);
        let sections = split_sections(&text);
        let context = ExtractionContext {
            table: validator.table(),
            strategy: OccurrenceStrategy::First,
            sections: &sections,
        };
        let partial = extractor.extract(&text, &context).unwrap().unwrap();
        Candidate::build(&extractor, partial, validator)
    }

    #[test]
    fn candidate_derives_and_scores() {
        let config = PipelineConfig::default();
        let validator = Validator::new(FieldPatternTable::builtin(), &config);
        let c = candidate(
            ExtractorProfile::narrative(),
            "Product Page Views: 10,000\nConversion Rate: 5%",
            &validator,
        );
        assert_eq!(c.metrics.value(Field::Downloads), Some(500.0));
        assert!(c.passes(30));
        let sources = c.field_sources();
        assert_eq!(sources["pageViews"], "narrative/primary");
        assert_eq!(sources["downloads"], "narrative/derived");
    }

    #[test]
    fn low_confidence_fails() {
        let config = PipelineConfig::default();
        let validator = Validator::new(FieldPatternTable::builtin(), &config);
        let c = candidate(ExtractorProfile::narrative(), "Conversion Rate: 250%", &validator);
        assert_eq!(c.report.overall_confidence, 25);
        assert!(!c.passes(30));
        assert!(c.rejection_reason(30).contains("below minimum 30"));
    }

    #[test]
    fn highest_prefers_score_then_order() {
        let config = PipelineConfig::default();
        let validator = Validator::new(FieldPatternTable::builtin(), &config);
        let text = "Downloads: 100\nSessions: 400";
        let asc = candidate(ExtractorProfile::app_store_connect(), text, &validator);
        let narrative = candidate(ExtractorProfile::narrative(), text, &validator);
        assert!(asc.score > narrative.score);

        let chosen = select(
            SelectionPolicy::HighestConfidence,
            vec![narrative.clone(), asc.clone()],
            &validator,
        )
        .unwrap();
        assert_eq!(chosen.extractor, "app_store_connect");

        let tie = select(
            SelectionPolicy::HighestConfidence,
            vec![narrative.clone(), narrative],
            &validator,
        )
        .unwrap();
        assert_eq!(tie.extractor, "narrative");
    }

    #[test]
    fn merge_fills_gaps_from_later_candidates() {
        let config = PipelineConfig::default();
        let validator = Validator::new(FieldPatternTable::builtin(), &config);
        let text = "Downloads: 100\nTop markets: US (70%), Canada (30%)";
        let asc = candidate(ExtractorProfile::app_store_connect(), text, &validator);
        let narrative = candidate(ExtractorProfile::narrative(), text, &validator);
        assert!(asc.partial.distributions.markets.is_empty());

        let merged = select(SelectionPolicy::Merge, vec![asc, narrative], &validator).unwrap();
        assert_eq!(merged.extractor, "app_store_connect+narrative");
        assert_eq!(merged.partial.distributions.markets.len(), 2);
        assert_eq!(merged.field_sources()["downloads"], "app_store_connect/primary");
    }

    #[test]
    fn merge_of_one_is_identity() {
        let config = PipelineConfig::default();
        let validator = Validator::new(FieldPatternTable::builtin(), &config);
        let c = candidate(ExtractorProfile::narrative(), "Downloads: 7", &validator);
        let merged = select(SelectionPolicy::Merge, vec![c], &validator).unwrap();
        assert_eq!(merged.extractor, "narrative");
    }
}
