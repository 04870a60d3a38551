use crate::config::PipelineConfig;
use crate::model::{Metric, MetricSet};
use crate::rules::FieldPatternTable;
use crate::validate::Validator;

/// Fill unknown fields from known ones with the table's formulas, using the
/// default pipeline settings.
pub fn fill_derived(known: &MetricSet, table: &FieldPatternTable) -> MetricSet {
    let config = PipelineConfig::default();
    fill_derived_with(known, &Validator::new(table, &config))
}

/// Fill unknown fields from known ones.
///
/// Each pass tries every unknown field's derivations in order; the first one
/// whose inputs are all known and whose result is finite and inside the
/// field's hard range wins. Passes repeat until nothing new is derived or the
/// configured pass limit is reached. Known fields are never overwritten.
pub fn fill_derived_with(known: &MetricSet, validator: &Validator<'_>) -> MetricSet {
    let config = validator.config();
    let mut metrics = known.clone();

    for pass in 0..config.derive_passes {
        let mut added = 0;

        for rule in validator.table().rules() {
            if metrics.is_known(rule.field) {
                continue;
            }

            for derivation in &rule.derivations {
                let Some(inputs) = derivation
                    .inputs
                    .iter()
                    .map(|f| metrics.value(*f))
                    .collect::<Option<Vec<f64>>>()
                else {
                    continue;
                };

                let value = (derivation.formula)(&inputs);
                if !value.is_finite() {
                    tracing::debug!(
                        field = %rule.field,
                        expression = derivation.expression,
                        "Derived value is not finite"
                    );
                    continue;
                }

                let assessment = validator.validate_field(rule.field, value);
                if !assessment.in_range {
                    tracing::debug!(
                        field = %rule.field,
                        value,
                        "Derived value rejected as implausible"
                    );
                    continue;
                }

                let confidence = (f64::from(assessment.confidence)
                    * config.derived_confidence_factor)
                    .round()
                    .clamp(0.0, 100.0) as u8;
                tracing::debug!(
                    field = %rule.field,
                    expression = derivation.expression,
                    value,
                    pass,
                    "Derived field"
                );
                metrics.insert(
                    rule.field,
                    Metric::calculated(value, confidence, assessment.warnings),
                );
                added += 1;
                break;
            }
        }

        if added == 0 {
            break;
        }
    }

    metrics
}
