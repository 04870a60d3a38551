use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How repeated matches of the same field are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceStrategy {
    /// Earliest position in the text.
    #[default]
    First,
    /// Latest position in the text.
    Last,
    /// Mean of all magnitudes and of all changes.
    Average,
}

impl fmt::Display for OccurrenceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccurrenceStrategy::First => write!(f, "first"),
            OccurrenceStrategy::Last => write!(f, "last"),
            OccurrenceStrategy::Average => write!(f, "average"),
        }
    }
}

/// How the pipeline picks among extractor candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Stop at the first candidate that passes validation.
    #[default]
    FirstSuccess,
    /// Run every extractor, keep the best combined score.
    HighestConfidence,
    /// Run every extractor and fill gaps in the best candidate from the others.
    Merge,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::FirstSuccess => write!(f, "first_success"),
            SelectionPolicy::HighestConfidence => write!(f, "highest_confidence"),
            SelectionPolicy::Merge => write!(f, "merge"),
        }
    }
}

/// Tolerances for cross-field and distribution checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Page views may exceed impressions by this fraction before a warning.
    pub page_view_tolerance: f64,
    /// Lower bound of downloads / (pageViews × conversionRate / 100).
    pub funnel_min_ratio: f64,
    /// Upper bound of the same ratio.
    pub funnel_max_ratio: f64,
    /// Allowed distance of a breakdown's percentage sum from 100.
    pub distribution_tolerance: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            page_view_tolerance: 0.10,
            funnel_min_ratio: 0.5,
            funnel_max_ratio: 2.0,
            distribution_tolerance: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub occurrence_strategy: OccurrenceStrategy,
    pub selection: SelectionPolicy,
    /// Candidates with metrics below this overall confidence are rejected.
    pub min_confidence: u8,
    /// Upper bound on derivation passes.
    pub derive_passes: usize,
    /// Multiplier applied to the plausibility confidence of derived values.
    pub derived_confidence_factor: f64,
    /// Weight of core fields in the overall confidence mean.
    pub core_field_weight: f64,
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            occurrence_strategy: OccurrenceStrategy::First,
            selection: SelectionPolicy::FirstSuccess,
            min_confidence: 30,
            derive_passes: 3,
            derived_confidence_factor: 0.8,
            core_field_weight: 2.0,
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn stop_on_first_success(&self) -> bool {
        self.selection == SelectionPolicy::FirstSuccess
    }
}

/// Load a pipeline config from a JSON file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ReportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ReportError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_config(&content, path)
}

/// Parse a pipeline config from a JSON string.
pub fn parse_config(json: &str, source: &Path) -> Result<PipelineConfig, ReportError> {
    let config: PipelineConfig =
        serde_json::from_str(json).map_err(|e| ReportError::ConfigLoad {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a pipeline config from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<PipelineConfig, ReportError> {
    let config: PipelineConfig = serde_json::from_str(json).map_err(ReportError::Json)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate that a config is usable.
pub fn validate_config(config: &PipelineConfig) -> Result<(), ReportError> {
    if config.min_confidence > 100 {
        return Err(ReportError::ConfigInvalid(format!(
            "min_confidence {} exceeds 100",
            config.min_confidence
        )));
    }

    if config.derive_passes == 0 {
        return Err(ReportError::ConfigInvalid(
            "derive_passes must be at least 1".into(),
        ));
    }

    if !(0.0..=1.0).contains(&config.derived_confidence_factor) {
        return Err(ReportError::ConfigInvalid(format!(
            "derived_confidence_factor {} is outside 0..=1",
            config.derived_confidence_factor
        )));
    }

    if !config.core_field_weight.is_finite() || config.core_field_weight <= 0.0 {
        return Err(ReportError::ConfigInvalid(
            "core_field_weight must be positive".into(),
        ));
    }

    let v = &config.validation;
    for (name, tolerance) in [
        ("page_view_tolerance", v.page_view_tolerance),
        ("distribution_tolerance", v.distribution_tolerance),
    ] {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ReportError::ConfigInvalid(format!(
                "{name} must be a non-negative number, got {tolerance}"
            )));
        }
    }
    if !v.funnel_min_ratio.is_finite()
        || !v.funnel_max_ratio.is_finite()
        || v.funnel_min_ratio < 0.0
        || v.funnel_min_ratio >= v.funnel_max_ratio
    {
        return Err(ReportError::ConfigInvalid(format!(
            "funnel ratio band {}..{} is empty",
            v.funnel_min_ratio, v.funnel_max_ratio
        )));
    }

    Ok(())
}
