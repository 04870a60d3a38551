pub mod config;
pub mod derive;
pub mod error;
pub mod extraction;
pub mod model;
pub mod parsing;
pub mod pipeline;
pub mod rules;
pub mod store;
pub mod trace;
pub mod validate;

use config::PipelineConfig;
use model::ExtractionResult;
use pipeline::ExtractionPipeline;

/// Main API entry point: extract a report with the builtin extractors and
/// default settings.
///
/// Never fails; an unusable report yields a result with `success = false`
/// and an error message.
pub fn extract_report(raw: &str) -> ExtractionResult {
    extract_report_with(raw, &PipelineConfig::default())
}

/// Extract a report with the builtin extractors and the given settings.
pub fn extract_report_with(raw: &str, config: &PipelineConfig) -> ExtractionResult {
    ExtractionPipeline::with_default_extractors(config.clone()).process(raw)
}
