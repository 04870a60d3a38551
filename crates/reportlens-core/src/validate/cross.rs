use crate::config::ValidationConfig;
use crate::model::{BreakdownKind, Distributions, Field, MetricSet, RetentionCurve};
use crate::parsing::format_magnitude;

/// Value of a field only if it was read from the text.
fn extracted(metrics: &MetricSet, field: Field) -> Option<f64> {
    metrics.get(field).filter(|m| m.extracted).map(|m| m.value)
}

/// Funnel checks between related fields. Only fields read from the text take
/// part; derived values agree with their inputs by construction.
pub fn validate_cross_consistency(metrics: &MetricSet, config: &ValidationConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if let (Some(views), Some(impressions)) = (
        extracted(metrics, Field::PageViews),
        extracted(metrics, Field::Impressions),
    ) {
        if views > impressions * (1.0 + config.page_view_tolerance) {
            warnings.push(format!(
                "pageViews ({}) exceeds impressions ({})",
                format_magnitude(views),
                format_magnitude(impressions)
            ));
        }
    }

    if let (Some(downloads), Some(views), Some(rate)) = (
        extracted(metrics, Field::Downloads),
        extracted(metrics, Field::PageViews),
        extracted(metrics, Field::ConversionRate),
    ) {
        let expected = views * rate / 100.0;
        if expected > 0.0 {
            let ratio = downloads / expected;
            if ratio < config.funnel_min_ratio || ratio > config.funnel_max_ratio {
                warnings.push(format!(
                    "downloads ({}) inconsistent with pageViews x conversionRate ({})",
                    format_magnitude(downloads),
                    format_magnitude(expected)
                ));
            }
        }
    }

    warnings
}

/// Flag breakdowns whose shares do not add up to 100.
pub fn validate_distributions(distributions: &Distributions, tolerance: f64) -> Vec<String> {
    BreakdownKind::ALL
        .iter()
        .filter(|kind| kind.sums_to_whole())
        .filter_map(|kind| {
            let list = distributions.list(*kind);
            if list.is_empty() {
                return None;
            }
            let sum: f64 = list.iter().map(|e| e.percentage).sum();
            ((sum - 100.0).abs() > tolerance)
                .then(|| format!("{kind} percentages sum to {sum:.1}%, expected 100%"))
        })
        .collect()
}

/// Retention can only fall over time; each present horizon is compared with
/// the previous present one.
pub fn validate_retention(retention: &RetentionCurve) -> Vec<String> {
    retention
        .present()
        .windows(2)
        .filter_map(|pair| {
            let (earlier_day, earlier) = pair[0];
            let (later_day, later) = pair[1];
            (later.value > earlier.value).then(|| {
                format!(
                    "retention {later_day} ({}%) exceeds {earlier_day} ({}%)",
                    later.value, earlier.value
                )
            })
        })
        .collect()
}
