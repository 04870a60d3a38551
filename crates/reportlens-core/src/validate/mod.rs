pub mod cross;
pub mod outcome;

pub use cross::{validate_cross_consistency, validate_distributions, validate_retention};
pub use outcome::{completeness, missing_fields, overall_confidence, ValidationReport};

use crate::config::PipelineConfig;
use crate::extraction::engine::FieldMatch;
use crate::model::{Distributions, Field, Metric, MetricSet, RetentionCurve};
use crate::parsing::format_magnitude;
use crate::rules::{FieldPatternTable, MatchTier};
use std::collections::BTreeMap;

/// Confidence of a value inside its field's usual range.
pub const PLAUSIBLE_CONFIDENCE: u8 = 95;
/// Confidence of a value above the field's typical ceiling.
pub const UNUSUAL_CONFIDENCE: u8 = 60;
/// Confidence of a value outside the field's hard range.
pub const IMPLAUSIBLE_CONFIDENCE: u8 = 25;

/// Plausibility verdict for one value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAssessment {
    pub confidence: u8,
    pub warnings: Vec<String>,
    /// False when the value is outside the hard range.
    pub in_range: bool,
}

/// Confidence multiplier for the pattern class that produced a value.
pub fn tier_factor(tier: MatchTier) -> f64 {
    match tier {
        MatchTier::Primary => 1.0,
        MatchTier::Alias => 0.85,
        MatchTier::None => 0.0,
    }
}

/// Checks values against the pattern table's ranges and the config's
/// tolerances.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    table: &'a FieldPatternTable,
    config: &'a PipelineConfig,
}

impl<'a> Validator<'a> {
    pub fn new(table: &'a FieldPatternTable, config: &'a PipelineConfig) -> Self {
        Self { table, config }
    }

    pub fn table(&self) -> &'a FieldPatternTable {
        self.table
    }

    pub fn config(&self) -> &'a PipelineConfig {
        self.config
    }

    /// Plausibility of `value` for `field`. Fields without a rule are
    /// accepted as plausible.
    pub fn validate_field(&self, field: Field, value: f64) -> FieldAssessment {
        let Some(rule) = self.table.rule(field) else {
            return FieldAssessment {
                confidence: PLAUSIBLE_CONFIDENCE,
                warnings: Vec::new(),
                in_range: true,
            };
        };
        let range = rule.range;

        if !value.is_finite() || value < range.min || value > range.max {
            let bound = if value < range.min {
                format!("below the minimum {}", range.min)
            } else {
                format!("above the maximum {}", range.max)
            };
            return FieldAssessment {
                confidence: IMPLAUSIBLE_CONFIDENCE,
                warnings: vec![format!("{field} value {value} is {bound}")],
                in_range: false,
            };
        }

        if value > range.typical_max {
            return FieldAssessment {
                confidence: UNUSUAL_CONFIDENCE,
                warnings: vec![format!(
                    "{field} value {} is unusually high (typical maximum {})",
                    format_magnitude(value),
                    format_magnitude(range.typical_max)
                )],
                in_range: true,
            };
        }

        FieldAssessment {
            confidence: PLAUSIBLE_CONFIDENCE,
            warnings: Vec::new(),
            in_range: true,
        }
    }

    /// Turn raw matches into scored metrics. Out-of-range values are kept
    /// with a low confidence and a warning.
    pub fn score_matches(&self, matches: &BTreeMap<Field, FieldMatch>) -> MetricSet {
        let mut metrics = MetricSet::new();
        for (field, m) in matches {
            if !m.is_matched() {
                continue;
            }
            let assessment = self.validate_field(*field, m.value);
            let confidence = (f64::from(assessment.confidence) * tier_factor(m.tier))
                .round()
                .clamp(0.0, 100.0) as u8;
            let mut warnings = m.warnings.clone();
            warnings.extend(assessment.warnings);
            metrics.insert(*field, Metric::extracted(m.value, m.change, confidence, warnings));
        }
        metrics
    }

    /// Full verdict over a candidate: scores plus every cross check.
    pub fn validate(
        &self,
        metrics: &MetricSet,
        distributions: &Distributions,
        retention: &RetentionCurve,
    ) -> ValidationReport {
        let tolerances = &self.config.validation;
        let mut warnings = validate_cross_consistency(metrics, tolerances);
        warnings.extend(validate_distributions(
            distributions,
            tolerances.distribution_tolerance,
        ));
        warnings.extend(validate_retention(retention));

        for warning in &warnings {
            tracing::warn!(warning = %warning, "Validation warning");
        }

        ValidationReport {
            overall_confidence: overall_confidence(metrics, self.config.core_field_weight),
            completeness: completeness(metrics, self.table),
            missing_fields: missing_fields(metrics, self.table),
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::engine::extract_metrics;
    use crate::parsing::normalize_text;

    fn with_validator<R>(f: impl FnOnce(&Validator<'_>) -> R) -> R {
        let config = PipelineConfig::default();
        let validator = Validator::new(FieldPatternTable::builtin(), &config);
        f(&validator)
    }

    #[test]
    fn plausible_value() {
        let a = with_validator(|v| v.validate_field(Field::Downloads, 10_245.0));
        assert_eq!(a.confidence, PLAUSIBLE_CONFIDENCE);
        assert!(a.warnings.is_empty());
    }

    #[test]
    fn percent_over_100_is_implausible() {
        let a = with_validator(|v| v.validate_field(Field::ConversionRate, 140.0));
        assert_eq!(a.confidence, IMPLAUSIBLE_CONFIDENCE);
        assert!(!a.in_range);
        assert_eq!(a.warnings.len(), 1);
    }

    #[test]
    fn negative_count_is_implausible() {
        let a = with_validator(|v| v.validate_field(Field::Sessions, -4.0));
        assert_eq!(a.confidence, IMPLAUSIBLE_CONFIDENCE);
        assert!(a.warnings[0].contains("below the minimum"));
    }

    #[test]
    fn high_conversion_rate_is_unusual() {
        let a = with_validator(|v| v.validate_field(Field::ConversionRate, 75.0));
        assert_eq!(a.confidence, UNUSUAL_CONFIDENCE);
        assert!(a.in_range);
        assert!(a.warnings[0].contains("unusually high"));
    }

    #[test]
    fn alias_matches_score_lower() {
        let text = normalize_text("Downloads: 100\nReinstalls: 40");
        let metrics = with_validator(|v| {
            let matches = extract_metrics(&text, v.table(), v.config().occurrence_strategy);
            v.score_matches(&matches)
        });
        assert_eq!(metrics.get(Field::Downloads).unwrap().confidence, 95);
        // 95 * 0.85
        assert_eq!(metrics.get(Field::Redownloads).unwrap().confidence, 81);
        assert!(metrics.get(Field::Redownloads).unwrap().extracted);
    }

    #[test]
    fn implausible_value_kept_with_warning() {
        let text = normalize_text("Conversion Rate: 250%");
        let metrics = with_validator(|v| {
            let matches = extract_metrics(&text, v.table(), v.config().occurrence_strategy);
            v.score_matches(&matches)
        });
        let cr = metrics.get(Field::ConversionRate).unwrap();
        assert_eq!(cr.value, 250.0);
        assert_eq!(cr.confidence, IMPLAUSIBLE_CONFIDENCE);
        assert!(!cr.warnings.is_empty());
    }

    #[test]
    fn report_collects_all_warnings() {
        let mut retention = RetentionCurve::default();
        retention.set(crate::model::RetentionDay::Day7, 10.0, None);
        retention.set(crate::model::RetentionDay::Day14, 15.0, None);
        let report = with_validator(|v| {
            v.validate(&MetricSet::new(), &Distributions::default(), &retention)
        });
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.overall_confidence, 0);
        assert_eq!(report.missing_fields.len(), Field::ALL.len());
    }
}
