pub mod select;

pub use select::Candidate;

use crate::config::PipelineConfig;
use crate::extraction::{default_extractors, ExtractionContext, ReportExtractor};
use crate::model::{ExtractionMetadata, ExtractionResult};
use crate::parsing::{normalize_text, sniff_format, split_sections, ReportFormat};
use crate::rules::FieldPatternTable;
use crate::store::MetricStore;
use crate::trace::{
    build_field_entries, CandidateOutcome, PipelineState, PipelineTrace, RunOutcome,
};
use crate::validate::Validator;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub const NO_TEXT_ERROR: &str = "No text provided for extraction";
pub const NO_DATA_ERROR: &str = "No extractor produced usable data";

/// Runs registered extractors over a report and assembles the final result.
pub struct ExtractionPipeline {
    config: PipelineConfig,
    table: FieldPatternTable,
    extractors: Vec<Box<dyn ReportExtractor>>,
}

impl ExtractionPipeline {
    /// A pipeline with the builtin pattern table and no extractors.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            table: FieldPatternTable::builtin().clone(),
            extractors: Vec::new(),
        }
    }

    /// A pipeline with the builtin extractors registered.
    pub fn with_default_extractors(config: PipelineConfig) -> Self {
        let mut pipeline = Self::new(config);
        for extractor in default_extractors() {
            pipeline.register(extractor);
        }
        pipeline
    }

    /// Replace the pattern table, e.g. with one carrying an overlay.
    pub fn with_table(mut self, table: FieldPatternTable) -> Self {
        self.table = table;
        self
    }

    pub fn register(&mut self, extractor: Box<dyn ReportExtractor>) {
        tracing::debug!(extractor = extractor.name(), "Registered extractor");
        self.extractors.push(extractor);
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn table(&self) -> &FieldPatternTable {
        &self.table
    }

    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub fn process(&self, raw: &str) -> ExtractionResult {
        self.process_traced(raw).0
    }

    /// Process and publish the result to a caller-owned store.
    pub fn process_into_store(&self, raw: &str, store: &mut MetricStore) -> ExtractionResult {
        let result = self.process(raw);
        store.record(&result);
        result
    }

    /// Extractors matching the sniffed layout first, then by descending
    /// priority, then in registration order.
    fn ordered(&self, format: ReportFormat) -> Vec<&dyn ReportExtractor> {
        let mut ordered: Vec<&dyn ReportExtractor> =
            self.extractors.iter().map(|e| e.as_ref()).collect();
        ordered.sort_by_key(|e| (e.format() != Some(format), std::cmp::Reverse(e.priority())));
        ordered
    }

    pub fn process_traced(&self, raw: &str) -> (ExtractionResult, PipelineTrace) {
        let mut trace = PipelineTrace::default();

        if raw.trim().is_empty() {
            trace.enter(PipelineState::Done(RunOutcome::Failure));
            tracing::info!(error = NO_TEXT_ERROR, "Extraction failed");
            return (
                ExtractionResult::failure(NO_TEXT_ERROR, Vec::new(), self.table.fields()),
                trace,
            );
        }

        trace.enter(PipelineState::Preprocessing);
        let text = normalize_text(raw);
        let sniff = sniff_format(&text);
        let sections = split_sections(&text);
        trace.record_sniff(&sniff);

        trace.enter(PipelineState::Extracting);
        let validator = Validator::new(&self.table, &self.config);
        let context = ExtractionContext {
            table: &self.table,
            strategy: self.config.occurrence_strategy,
            sections: &sections,
        };

        let mut passing = Vec::new();
        let mut diagnostics = Vec::new();

        for extractor in self.ordered(sniff.format) {
            let name = extractor.name();
            trace.order.push(name.to_string());

            let attempt = catch_unwind(AssertUnwindSafe(|| extractor.extract(&text, &context)));
            let partial = match attempt {
                Ok(Ok(Some(partial))) => partial,
                Ok(Ok(None)) => {
                    trace.decide(name, CandidateOutcome::Empty, (0, 0, 0), "nothing found");
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::warn!(extractor = name, error = %e, "Extractor failed");
                    diagnostics.push(format!("{name}: {e}"));
                    trace.decide(name, CandidateOutcome::Failed, (0, 0, 0), e.to_string());
                    continue;
                }
                Err(payload) => {
                    let reason = format!("panicked: {}", panic_message(payload.as_ref()));
                    tracing::error!(extractor = name, reason = %reason, "Extractor panicked");
                    diagnostics.push(format!("{name}: {reason}"));
                    trace.decide(name, CandidateOutcome::Failed, (0, 0, 0), reason);
                    continue;
                }
            };

            let candidate = Candidate::build(extractor, partial, &validator);
            let scores = (
                candidate.report.overall_confidence,
                candidate.report.completeness,
                candidate.score,
            );
            trace.entries.extend(build_field_entries(
                name,
                &candidate.partial.matches,
                &candidate.metrics,
            ));

            if candidate.passes(self.config.min_confidence) {
                trace.decide(name, CandidateOutcome::Accepted, scores, "passed validation");
                passing.push(candidate);
                if self.config.stop_on_first_success() {
                    break;
                }
            } else {
                let reason = candidate.rejection_reason(self.config.min_confidence);
                tracing::debug!(extractor = name, reason = %reason, "Candidate rejected");
                diagnostics.extend(candidate.report.warnings.iter().cloned());
                diagnostics.push(reason.clone());
                trace.decide(name, CandidateOutcome::Rejected, scores, reason);
            }
        }

        trace.enter(PipelineState::Validating);
        let Some(chosen) = select::select(self.config.selection, passing, &validator) else {
            trace.enter(PipelineState::Done(RunOutcome::Failure));
            tracing::info!(error = NO_DATA_ERROR, "Extraction failed");
            return (
                ExtractionResult::failure(NO_DATA_ERROR, diagnostics, self.table.fields()),
                trace,
            );
        };

        trace.selected = Some(chosen.extractor.clone());
        let result = self.assemble(chosen, sniff.format, diagnostics);
        trace.enter(PipelineState::Done(RunOutcome::Success));

        tracing::info!(
            extractor = %result.metadata.extractor_used,
            completeness = result.metadata.completeness,
            confidence = result.metadata.overall_confidence,
            "Extraction complete"
        );
        (result, trace)
    }

    fn assemble(
        &self,
        chosen: Candidate,
        format: ReportFormat,
        diagnostics: Vec<String>,
    ) -> ExtractionResult {
        let field_sources = chosen.field_sources();
        let mut metrics = chosen.metrics;
        metrics.fill_missing(self.table.fields());

        let warnings = chosen.report.warnings;
        let mut metadata_warnings = warnings.clone();
        metadata_warnings.extend(chosen.partial.warnings);
        metadata_warnings.extend(diagnostics);

        ExtractionResult {
            metrics,
            distributions: chosen.partial.distributions,
            retention: chosen.partial.retention,
            summary: chosen.partial.summary.into_summary(),
            success: true,
            error: None,
            warnings,
            metadata: ExtractionMetadata {
                completeness: chosen.report.completeness,
                overall_confidence: chosen.report.overall_confidence,
                missing_fields: chosen
                    .report
                    .missing_fields
                    .iter()
                    .map(|f| f.key().to_string())
                    .collect(),
                extractor_used: chosen.extractor,
                field_sources,
                format: format.to_string(),
                warnings: metadata_warnings,
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::with_default_extractors(PipelineConfig::default())
    }
}
