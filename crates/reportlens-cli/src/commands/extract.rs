use reportlens_core::config::{
    load_config, validate_config, OccurrenceStrategy, PipelineConfig, SelectionPolicy,
};
use reportlens_core::error::ReportError;
use reportlens_core::pipeline::ExtractionPipeline;
use reportlens_core::rules::{load_overlay, FieldPatternTable};
use std::io::Read;
use std::path::PathBuf;

use crate::output;

pub struct ExtractArgs {
    pub input_file: String,
    pub output_format: String,
    pub output_file: Option<PathBuf>,
    pub strategy: Option<OccurrenceStrategy>,
    pub policy: Option<SelectionPolicy>,
    pub config_file: Option<PathBuf>,
    pub pattern_files: Vec<PathBuf>,
    pub trace: bool,
}

pub fn run(args: ExtractArgs) -> Result<(), ReportError> {
    let mut config = match &args.config_file {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(strategy) = args.strategy {
        config.occurrence_strategy = strategy;
    }
    if let Some(policy) = args.policy {
        config.selection = policy;
    }
    validate_config(&config)?;

    let mut table = FieldPatternTable::builtin().clone();
    for path in &args.pattern_files {
        let overlay = load_overlay(path)?;
        table = table.with_overlay(&overlay)?;
    }

    let text = read_input(&args.input_file)?;
    tracing::debug!(
        bytes = text.len(),
        strategy = %config.occurrence_strategy,
        policy = %config.selection,
        "Extracting report"
    );

    let pipeline = ExtractionPipeline::with_default_extractors(config).with_table(table);
    let (result, trace) = pipeline.process_traced(&text);

    if args.trace {
        eprintln!("{}", serde_json::to_string_pretty(&trace)?);
    }

    match args.output_file {
        Some(path) => {
            // Always write JSON when saving to file
            let json = serde_json::to_string_pretty(&result)?;
            std::fs::write(&path, json)?;
            eprintln!(
                "Extracted {} metric(s) with {}, written to {}",
                result.metrics.known_count(),
                result.metadata.extractor_used,
                path.display()
            );
            for w in &result.warnings {
                eprintln!("  warning: {w}");
            }
        }
        None => match args.output_format.as_str() {
            "json" => output::json::print(&result)?,
            _ => output::table::print(&result),
        },
    }

    Ok(())
}

fn read_input(input: &str) -> Result<String, ReportError> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}
