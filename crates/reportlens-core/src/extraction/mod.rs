pub mod distribution;
pub mod engine;
pub mod retention;

pub use distribution::{extract_distributions, BreakdownStyle};
pub use engine::{extract_field, extract_metrics, FieldMatch};
pub use retention::extract_retention;

use crate::config::OccurrenceStrategy;
use crate::error::ReportError;
use crate::model::{Distributions, Field, MetricSet, RetentionCurve};
use crate::parsing::{parse_summary, PartialSummary, ReportFormat, Section};
use crate::rules::FieldPatternTable;
use crate::validate::{ValidationReport, Validator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shared inputs prepared once per pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub table: &'a FieldPatternTable,
    pub strategy: OccurrenceStrategy,
    pub sections: &'a [Section<'a>],
}

/// Everything one extractor read from a report, before scoring.
#[derive(Debug, Clone, Default)]
pub struct PartialResult {
    /// Matched fields only.
    pub matches: BTreeMap<Field, FieldMatch>,
    pub distributions: Distributions,
    pub retention: RetentionCurve,
    pub summary: PartialSummary,
    pub warnings: Vec<String>,
}

impl PartialResult {
    /// True if anything beyond summary text was found.
    pub fn has_content(&self) -> bool {
        !self.matches.is_empty() || !self.distributions.is_empty() || !self.retention.is_empty()
    }
}

/// One extraction strategy the pipeline can run.
pub trait ReportExtractor: Send + Sync {
    /// Name recorded in `extractorUsed` and `fieldSources`.
    fn name(&self) -> &str;

    /// Higher runs earlier.
    fn priority(&self) -> u32;

    /// Scales the combined score, 0..=100.
    fn confidence_baseline(&self) -> u8;

    /// Layout this extractor is built for, if any. Extractors matching the
    /// sniffed layout run first.
    fn format(&self) -> Option<ReportFormat> {
        None
    }

    /// Read the normalized text. `Ok(None)` means nothing usable was found.
    fn extract(
        &self,
        text: &str,
        context: &ExtractionContext<'_>,
    ) -> Result<Option<PartialResult>, ReportError>;

    /// Judge a candidate built from this extractor's output.
    fn validate(
        &self,
        metrics: &MetricSet,
        partial: &PartialResult,
        validator: &Validator<'_>,
    ) -> ValidationReport {
        validator.validate(metrics, &partial.distributions, &partial.retention)
    }
}

/// The data that distinguishes one builtin extractor from another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorProfile {
    pub name: String,
    pub priority: u32,
    pub confidence_baseline: u8,
    pub format: ReportFormat,
    pub breakdown_style: BreakdownStyle,
}

impl ExtractorProfile {
    pub fn app_store_connect() -> Self {
        Self {
            name: "app_store_connect".into(),
            priority: 100,
            confidence_baseline: 90,
            format: ReportFormat::AppStoreConnect,
            breakdown_style: BreakdownStyle::SeeAll,
        }
    }

    pub fn narrative() -> Self {
        Self {
            name: "narrative".into(),
            priority: 80,
            confidence_baseline: 80,
            format: ReportFormat::Narrative,
            breakdown_style: BreakdownStyle::Headed,
        }
    }
}

/// Pattern-table extractor driven by a profile.
#[derive(Debug, Clone)]
pub struct StructuredExtractor {
    profile: ExtractorProfile,
}

impl StructuredExtractor {
    pub fn new(profile: ExtractorProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &ExtractorProfile {
        &self.profile
    }
}

impl ReportExtractor for StructuredExtractor {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn priority(&self) -> u32 {
        self.profile.priority
    }

    fn confidence_baseline(&self) -> u8 {
        self.profile.confidence_baseline
    }

    fn format(&self) -> Option<ReportFormat> {
        Some(self.profile.format)
    }

    fn extract(
        &self,
        text: &str,
        context: &ExtractionContext<'_>,
    ) -> Result<Option<PartialResult>, ReportError> {
        let matches = extract_metrics(text, context.table, context.strategy);
        let distributions =
            extract_distributions(text, context.sections, self.profile.breakdown_style);
        let retention = extract_retention(text);
        let summary = parse_summary(text, context.sections);

        let partial = PartialResult {
            matches,
            distributions,
            retention,
            summary,
            warnings: Vec::new(),
        };

        tracing::debug!(
            extractor = %self.profile.name,
            fields = partial.matches.len(),
            has_content = partial.has_content(),
            "Extractor finished"
        );

        Ok(partial.has_content().then_some(partial))
    }
}

/// The builtin extractors, in registration order.
pub fn default_extractors() -> Vec<Box<dyn ReportExtractor>> {
    vec![
        Box::new(StructuredExtractor::new(ExtractorProfile::app_store_connect())),
        Box::new(StructuredExtractor::new(ExtractorProfile::narrative())),
    ]
}
