use crate::model::{Field, MetricSet};
use crate::rules::FieldPatternTable;
use serde::Serialize;

/// Validation verdict for one candidate extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Weighted mean confidence over known fields.
    pub overall_confidence: u8,
    /// Percentage of table fields that are known.
    pub completeness: u8,
    /// Table fields nothing could fill, in table order.
    pub missing_fields: Vec<Field>,
    /// Cross-field, distribution and retention warnings.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Combined score used to rank candidates, scaled by the extractor's baseline.
    pub fn score(&self, baseline: u8) -> u8 {
        let raw = 0.6 * f64::from(self.overall_confidence) + 0.4 * f64::from(self.completeness);
        (raw * f64::from(baseline) / 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// Weighted mean of the confidences of known fields; core fields weigh
/// `core_weight`, the rest 1. Zero when nothing is known.
pub fn overall_confidence(metrics: &MetricSet, core_weight: f64) -> u8 {
    let (sum, weights) = metrics
        .known()
        .fold((0.0, 0.0), |(sum, weights), (field, metric)| {
            let w = if field.is_core() { core_weight } else { 1.0 };
            (sum + w * f64::from(metric.confidence), weights + w)
        });
    if weights == 0.0 {
        return 0;
    }
    (sum / weights).round().clamp(0.0, 100.0) as u8
}

/// Percentage of the table's fields known in `metrics`.
pub fn completeness(metrics: &MetricSet, table: &FieldPatternTable) -> u8 {
    let fields = table.fields();
    if fields.is_empty() {
        return 0;
    }
    let known = fields.iter().filter(|f| metrics.is_known(**f)).count();
    (known as f64 * 100.0 / fields.len() as f64).round() as u8
}

/// Table fields not known in `metrics`.
pub fn missing_fields(metrics: &MetricSet, table: &FieldPatternTable) -> Vec<Field> {
    table
        .fields()
        .into_iter()
        .filter(|f| !metrics.is_known(*f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metric;

    #[test]
    fn core_fields_weigh_double() {
        let mut metrics = MetricSet::new();
        metrics.insert(Field::Downloads, Metric::extracted(1.0, 0.0, 90, vec![]));
        metrics.insert(Field::Crashes, Metric::extracted(1.0, 0.0, 60, vec![]));
        // (2*90 + 60) / 3
        assert_eq!(overall_confidence(&metrics, 2.0), 80);
        assert_eq!(overall_confidence(&metrics, 1.0), 75);
    }

    #[test]
    fn missing_metrics_do_not_count() {
        let mut metrics = MetricSet::with_defaults(Field::ALL);
        metrics.insert(Field::Sessions, Metric::extracted(1.0, 0.0, 95, vec![]));
        assert_eq!(overall_confidence(&metrics, 2.0), 95);
        assert_eq!(overall_confidence(&MetricSet::new(), 2.0), 0);
    }

    #[test]
    fn completeness_counts_known_fields() {
        let table = FieldPatternTable::builtin();
        let mut metrics = MetricSet::with_defaults(Field::ALL);
        assert_eq!(completeness(&metrics, table), 0);
        for field in &Field::ALL[..7] {
            metrics.insert(*field, Metric::calculated(1.0, 50, vec![]));
        }
        assert_eq!(completeness(&metrics, table), 50);
        assert_eq!(missing_fields(&metrics, table).len(), 7);
    }

    #[test]
    fn score_blends_confidence_and_completeness() {
        let report = ValidationReport {
            overall_confidence: 90,
            completeness: 50,
            ..Default::default()
        };
        // (54 + 20) * 0.9
        assert_eq!(report.score(90), 67);
        assert_eq!(report.score(100), 74);
    }
}
