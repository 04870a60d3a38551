use crate::extraction::engine::FieldMatch;
use crate::model::{Field, MetricSet};
use crate::parsing::{format_magnitude, FormatSniff, ReportFormat};
use crate::rules::MatchTier;
use serde::Serialize;

pub const TRACE_SCHEMA_VERSION: &str = "1.0";

/// Stage of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Preprocessing,
    Extracting,
    Validating,
    Done(RunOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceSeverity {
    Critical,
    Important,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepType {
    MatchPattern,
    ParseValue,
    DeriveValue,
    PlausibilityCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub step_type: TraceStepType,
    pub message: String,
}

/// How one field of one candidate got its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub entry_id: String,
    pub extractor: String,
    pub field: Field,
    pub source: String,
    pub value: f64,
    pub confidence: u8,
    pub steps: Vec<TraceStep>,
}

/// What happened to one extractor's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Passed validation and was kept for selection.
    Accepted,
    /// Produced data that failed validation.
    Rejected,
    /// Found nothing usable.
    Empty,
    /// Returned an error.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceDecision {
    pub decision_id: String,
    pub extractor: String,
    pub outcome: CandidateOutcome,
    pub overall_confidence: u8,
    pub completeness: u8,
    pub score: u8,
    pub reason: String,
    pub severity: TraceSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineTrace {
    pub trace_schema_version: String,
    pub states: Vec<PipelineState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ReportFormat>,
    pub app_store_score: usize,
    pub narrative_score: usize,
    /// Extractor names in the order they ran.
    pub order: Vec<String>,
    pub decisions: Vec<TraceDecision>,
    pub entries: Vec<TraceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

impl Default for PipelineTrace {
    fn default() -> Self {
        Self {
            trace_schema_version: TRACE_SCHEMA_VERSION.to_string(),
            states: vec![PipelineState::Idle],
            format: None,
            app_store_score: 0,
            narrative_score: 0,
            order: Vec::new(),
            decisions: Vec::new(),
            entries: Vec::new(),
            selected: None,
        }
    }
}

impl PipelineTrace {
    pub fn enter(&mut self, state: PipelineState) {
        tracing::debug!(state = ?state, "Pipeline state");
        self.states.push(state);
    }

    pub fn state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Idle)
    }

    pub fn record_sniff(&mut self, sniff: &FormatSniff) {
        self.format = Some(sniff.format);
        self.app_store_score = sniff.app_store_score;
        self.narrative_score = sniff.narrative_score;
    }

    pub fn decide(
        &mut self,
        extractor: &str,
        outcome: CandidateOutcome,
        scores: (u8, u8, u8),
        reason: impl Into<String>,
    ) {
        let (overall_confidence, completeness, score) = scores;
        let severity = match outcome {
            CandidateOutcome::Accepted => TraceSeverity::Info,
            CandidateOutcome::Rejected | CandidateOutcome::Empty => TraceSeverity::Important,
            CandidateOutcome::Failed => TraceSeverity::Critical,
        };
        self.decisions.push(TraceDecision {
            decision_id: format!("dec_{}_{}", self.decisions.len(), extractor),
            extractor: extractor.to_string(),
            outcome,
            overall_confidence,
            completeness,
            score,
            reason: reason.into(),
            severity,
        });
    }
}

/// Per-field entries for one candidate's known metrics.
pub fn build_field_entries(
    extractor: &str,
    matches: &std::collections::BTreeMap<Field, FieldMatch>,
    metrics: &MetricSet,
) -> Vec<TraceEntry> {
    metrics
        .known()
        .map(|(field, metric)| {
            let mut steps = Vec::new();
            let source = match matches.get(&field).filter(|_| metric.extracted) {
                Some(m) => {
                    for occurrence in &m.occurrences {
                        steps.push(TraceStep {
                            step_type: TraceStepType::MatchPattern,
                            message: format!(
                                "Matched label '{}' ({:?}) at offset {}",
                                occurrence.label, occurrence.shape, occurrence.position
                            ),
                        });
                    }
                    steps.push(TraceStep {
                        step_type: TraceStepType::ParseValue,
                        message: format!(
                            "Resolved {} occurrence(s) to {} (change {}%)",
                            m.occurrences.len(),
                            format_magnitude(m.value),
                            m.change
                        ),
                    });
                    tier_source(m.tier)
                }
                None => {
                    steps.push(TraceStep {
                        step_type: TraceStepType::DeriveValue,
                        message: format!(
                            "Calculated {} from other fields",
                            format_magnitude(metric.value)
                        ),
                    });
                    "derived"
                }
            };
            steps.push(TraceStep {
                step_type: TraceStepType::PlausibilityCheck,
                message: if metric.warnings.is_empty() {
                    format!("Confidence {}", metric.confidence)
                } else {
                    format!("Confidence {}: {}", metric.confidence, metric.warnings.join("; "))
                },
            });

            TraceEntry {
                entry_id: format!("ent_{}_{}", extractor, field.key()),
                extractor: extractor.to_string(),
                field,
                source: source.to_string(),
                value: metric.value,
                confidence: metric.confidence,
                steps,
            }
        })
        .collect()
}

fn tier_source(tier: MatchTier) -> &'static str {
    match tier {
        MatchTier::Primary => "primary",
        MatchTier::Alias => "alias",
        MatchTier::None => "derived",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metric;
    use std::collections::BTreeMap;

    #[test]
    fn starts_idle() {
        let mut trace = PipelineTrace::default();
        assert_eq!(trace.state(), PipelineState::Idle);
        trace.enter(PipelineState::Preprocessing);
        assert_eq!(trace.state(), PipelineState::Preprocessing);
    }

    #[test]
    fn decisions_get_sequential_ids() {
        let mut trace = PipelineTrace::default();
        trace.decide("narrative", CandidateOutcome::Empty, (0, 0, 0), "nothing found");
        trace.decide("app_store_connect", CandidateOutcome::Accepted, (90, 50, 68), "passed");
        assert_eq!(trace.decisions[0].decision_id, "dec_0_narrative");
        assert_eq!(trace.decisions[1].decision_id, "dec_1_app_store_connect");
        assert_eq!(trace.decisions[1].severity, TraceSeverity::Info);
    }

    #[test]
    fn derived_entries_have_derive_step() {
        let mut metrics = MetricSet::new();
        metrics.insert(Field::Arpd, Metric::calculated(2.5, 76, vec![]));
        let entries = build_field_entries("narrative", &BTreeMap::new(), &metrics);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, "derived");
        assert_eq!(entries[0].entry_id, "ent_narrative_arpd");
        assert_eq!(entries[0].steps[0].step_type, TraceStepType::DeriveValue);
    }

    #[test]
    fn serializes_done_state() {
        let mut trace = PipelineTrace::default();
        trace.enter(PipelineState::Done(RunOutcome::Failure));
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["states"][1]["done"], "failure");
        assert_eq!(json["trace_schema_version"], "1.0");
    }
}
