pub mod builtin;
pub mod schema;

use crate::error::ReportError;
use crate::model::{Field, FieldKind};
use regex::Regex;
use schema::PatternOverlayDef;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// Which pattern class produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Primary,
    Alias,
    None,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTier::Primary => write!(f, "primary"),
            MatchTier::Alias => write!(f, "alias"),
            MatchTier::None => write!(f, "none"),
        }
    }
}

/// Textual arrangement a pattern recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternShape {
    /// `Label: value (+change%)` on one line.
    Inline,
    /// Label line, optional `?` line, value line, optional change line.
    Block,
    /// `Label increased by N% to value`.
    Sentence,
    /// `value Label`, e.g. "10245 downloads".
    Trailing,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub regex: Regex,
    pub shape: PatternShape,
    pub label: String,
}

/// A pure formula filling one field from others.
#[derive(Debug, Clone, Copy)]
pub struct Derivation {
    pub inputs: &'static [Field],
    pub formula: fn(&[f64]) -> f64,
    /// Human-readable form, for `fields explain` and warnings.
    pub expression: &'static str,
}

/// Hard and soft bounds a field's value is checked against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibleRange {
    pub min: f64,
    pub max: f64,
    pub typical_max: f64,
}

impl PlausibleRange {
    fn for_kind(kind: FieldKind, typical_max: f64) -> Self {
        match kind {
            FieldKind::Percent => Self {
                min: 0.0,
                max: 100.0,
                typical_max: typical_max.min(100.0),
            },
            FieldKind::Count | FieldKind::Currency | FieldKind::Ratio => Self {
                min: 0.0,
                max: f64::INFINITY,
                typical_max,
            },
        }
    }
}

/// Compiled extraction rules for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: Field,
    pub kind: FieldKind,
    pub labels: Vec<String>,
    pub aliases: Vec<String>,
    pub reject_prefixes: Vec<String>,
    pub primary: Vec<Pattern>,
    pub alias_patterns: Vec<Pattern>,
    pub derivations: Vec<Derivation>,
    pub range: PlausibleRange,
}

impl FieldRule {
    pub fn patterns(&self, tier: MatchTier) -> &[Pattern] {
        match tier {
            MatchTier::Primary => &self.primary,
            MatchTier::Alias => &self.alias_patterns,
            MatchTier::None => &[],
        }
    }

    fn compile(
        field: Field,
        labels: Vec<String>,
        aliases: Vec<String>,
        reject_prefixes: Vec<String>,
        typical_max: f64,
        derivations: Vec<Derivation>,
    ) -> Result<Self, ReportError> {
        let mut primary = Vec::new();
        for label in &labels {
            for shape in [PatternShape::Inline, PatternShape::Block, PatternShape::Sentence] {
                primary.push(compile_pattern(label, shape)?);
            }
        }

        let mut alias_patterns = Vec::new();
        for label in &aliases {
            for shape in [PatternShape::Inline, PatternShape::Block, PatternShape::Sentence] {
                alias_patterns.push(compile_pattern(label, shape)?);
            }
        }
        for label in labels.iter().chain(aliases.iter()) {
            alias_patterns.push(compile_pattern(label, PatternShape::Trailing)?);
        }

        Ok(Self {
            field,
            kind: field.kind(),
            labels,
            aliases,
            reject_prefixes: reject_prefixes.iter().map(|p| p.to_lowercase()).collect(),
            primary,
            alias_patterns,
            derivations,
            range: PlausibleRange::for_kind(field.kind(), typical_max),
        })
    }
}

const VALUE: &str = r"(?P<value>(?:[$\u{20AC}\u{00A3}\u{00A5}][ \t]?)?\d[\d,]*(?:\.\d+)?(?:[ \t]?(?:[KkMmBb]|thousand|million|billion)\b)?(?:[ \t]?%)?)";

const INLINE_CHANGE: &str = r"(?:[ \t]*(?P<change>\([^()\n]*?\d+(?:\.\d+)?[ \t]*%[^()\n]*\)|[+\-\u{2191}\u{2193}\u{25B2}\u{25BC}][ \t]?\d+(?:\.\d+)?[ \t]*%))?";

const SEPARATOR: &str = r"[ \t]*(?:[:=\-\u{2013}]|\bwas\b|\bwere\b|\bof\b|\breached\b|\btotal(?:ed|led)?\b|\bat\b)?[ \t]*";

const CHANGE_VERB: &str = r"(?:increased|decreased|grew|rose|fell|dropped|declined|climbed|jumped)";

/// Turn a plain-text label into a regex fragment captured as `label`.
fn label_fragment(label: &str) -> String {
    let words: Vec<String> = label.split_whitespace().map(regex::escape).collect();
    let body = words.join(r"[ \t]+");
    let starts_word = label.chars().next().is_some_and(|c| c.is_alphanumeric());
    let ends_word = label.chars().last().is_some_and(|c| c.is_alphanumeric());
    format!(
        "(?P<label>{}{}{})",
        if starts_word { r"\b" } else { "" },
        body,
        if ends_word { r"\b" } else { "" }
    )
}

fn compile_pattern(label: &str, shape: PatternShape) -> Result<Pattern, ReportError> {
    let label_re = label_fragment(label);
    let source = match shape {
        PatternShape::Inline => format!(r"(?im){label_re}{SEPARATOR}{VALUE}{INLINE_CHANGE}"),
        PatternShape::Block => format!(
            r"(?im)^[ \t]*{label_re}[ \t]*:?[ \t]*\n(?:[ \t]*\?[ \t]*\n)?[ \t]*{VALUE}[ \t]*$(?:\n[ \t]*(?P<change>[+\-\u{{2191}}\u{{2193}}\u{{25B2}}\u{{25BC}}]?[ \t]?\d+(?:\.\d+)?[ \t]*%)[ \t]*$)?"
        ),
        PatternShape::Sentence => format!(
            r"(?i){label_re}[ \t]+(?:(?:has|have)[ \t]+)?(?P<change>{CHANGE_VERB}[ \t]+(?:by[ \t]+)?\d+(?:\.\d+)?[ \t]*%)[ \t]+to[ \t]+{VALUE}"
        ),
        PatternShape::Trailing => format!(
            r"(?i)(?:^|[^\w.$\u{{20AC}}\u{{00A3}}])(?P<value>\d[\d,]*(?:\.\d+)?(?:[ \t]?(?:[KkMmBb]|thousand|million|billion)\b)?)[ \t]+(?:total[ \t]+|new[ \t]+)?{label_re}{INLINE_CHANGE}"
        ),
    };

    let regex = Regex::new(&source).map_err(|e| {
        ReportError::OverlayInvalid(format!("label '{label}' does not compile: {e}"))
    })?;

    Ok(Pattern {
        regex,
        shape,
        label: label.to_string(),
    })
}

static BUILTIN_TABLE: LazyLock<FieldPatternTable> =
    LazyLock::new(|| FieldPatternTable::compile_builtin().expect("builtin patterns compile"));

/// The single registry of extraction rules, keyed by field.
#[derive(Debug, Clone)]
pub struct FieldPatternTable {
    rules: Vec<FieldRule>,
}

impl FieldPatternTable {
    /// The shared, read-only builtin table.
    pub fn builtin() -> &'static FieldPatternTable {
        &BUILTIN_TABLE
    }

    fn compile_builtin() -> Result<Self, ReportError> {
        let rules = builtin::RULES
            .iter()
            .map(|r| {
                FieldRule::compile(
                    r.field,
                    r.labels.iter().map(|s| s.to_string()).collect(),
                    r.aliases.iter().map(|s| s.to_string()).collect(),
                    r.reject_prefixes.iter().map(|s| s.to_string()).collect(),
                    r.typical_max,
                    r.derivations.to_vec(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn rule(&self, field: Field) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.field == field)
    }

    /// Fields in table order.
    pub fn fields(&self) -> Vec<Field> {
        self.rules.iter().map(|r| r.field).collect()
    }

    /// Build a new table with the overlay's labels appended.
    pub fn with_overlay(&self, overlay: &PatternOverlayDef) -> Result<Self, ReportError> {
        validate_overlay(overlay)?;

        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let extra: Vec<_> = overlay
                .fields
                .iter()
                .filter(|f| Field::from_key(&f.field) == Some(rule.field))
                .collect();
            if extra.is_empty() {
                rules.push(rule.clone());
                continue;
            }

            let mut labels = rule.labels.clone();
            let mut aliases = rule.aliases.clone();
            let mut reject_prefixes = rule.reject_prefixes.clone();
            for def in extra {
                labels.extend(def.labels.iter().cloned());
                aliases.extend(def.aliases.iter().cloned());
                reject_prefixes.extend(def.reject_prefixes.iter().cloned());
            }

            rules.push(FieldRule::compile(
                rule.field,
                labels,
                aliases,
                reject_prefixes,
                rule.range.typical_max,
                rule.derivations.clone(),
            )?);
        }

        tracing::debug!(overlay = %overlay.name, "Applied pattern overlay");
        Ok(Self { rules })
    }
}

/// Load a pattern overlay from a JSON file.
pub fn load_overlay(path: &Path) -> Result<PatternOverlayDef, ReportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ReportError::OverlayLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_overlay(&content, path)
}

/// Parse a pattern overlay from a JSON string.
pub fn parse_overlay(json: &str, source: &Path) -> Result<PatternOverlayDef, ReportError> {
    let overlay: PatternOverlayDef =
        serde_json::from_str(json).map_err(|e| ReportError::OverlayLoad {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_overlay(&overlay)?;
    Ok(overlay)
}

/// Parse a pattern overlay from a JSON string (no file path context).
pub fn parse_overlay_str(json: &str) -> Result<PatternOverlayDef, ReportError> {
    let overlay: PatternOverlayDef = serde_json::from_str(json).map_err(ReportError::Json)?;
    validate_overlay(&overlay)?;
    Ok(overlay)
}

/// Validate that an overlay is well-formed.
pub fn validate_overlay(overlay: &PatternOverlayDef) -> Result<(), ReportError> {
    if overlay.fields.is_empty() {
        return Err(ReportError::OverlayInvalid("fields must not be empty".into()));
    }

    for def in &overlay.fields {
        if Field::from_key(&def.field).is_none() {
            return Err(ReportError::UnknownField(def.field.clone()));
        }

        if def.labels.is_empty() && def.aliases.is_empty() && def.reject_prefixes.is_empty() {
            return Err(ReportError::OverlayInvalid(format!(
                "field '{}' adds no labels, aliases or reject prefixes",
                def.field
            )));
        }

        for label in def.labels.iter().chain(def.aliases.iter()) {
            if label.trim().is_empty() {
                return Err(ReportError::OverlayInvalid(format!(
                    "field '{}' has an empty label",
                    def.field
                )));
            }
            compile_pattern(label, PatternShape::Inline)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_every_field() {
        let table = FieldPatternTable::builtin();
        assert_eq!(table.fields(), Field::ALL.to_vec());
    }

    #[test]
    fn primary_tier_has_three_shapes_per_label() {
        let rule = FieldPatternTable::builtin().rule(Field::Crashes).unwrap();
        assert_eq!(rule.primary.len(), rule.labels.len() * 3);
        assert!(rule
            .alias_patterns
            .iter()
            .any(|p| p.shape == PatternShape::Trailing));
    }

    #[test]
    fn percent_fields_are_capped_at_100() {
        let rule = FieldPatternTable::builtin().rule(Field::ConversionRate).unwrap();
        assert_eq!(rule.range.max, 100.0);
        assert_eq!(rule.kind, FieldKind::Percent);
    }

    #[test]
    fn inline_pattern_captures_value_and_change() {
        let p = compile_pattern("Downloads", PatternShape::Inline).unwrap();
        let caps = p.regex.captures("Downloads: 10245 (+12%)").unwrap();
        assert_eq!(caps.name("value").unwrap().as_str(), "10245");
        assert_eq!(caps.name("change").unwrap().as_str(), "(+12%)");
    }

    #[test]
    fn block_pattern_spans_placeholder() {
        let p = compile_pattern("Impressions", PatternShape::Block).unwrap();
        let caps = p.regex.captures("Impressions\n?\n2.91M\n+12%\nSessions").unwrap();
        assert_eq!(caps.name("value").unwrap().as_str(), "2.91M");
        assert_eq!(caps.name("change").unwrap().as_str(), "+12%");
    }

    #[test]
    fn label_must_be_followed_by_value() {
        let p = compile_pattern("Sessions", PatternShape::Inline).unwrap();
        assert!(p.regex.captures("Sessions per Active Device 2.5").is_none());
    }

    #[test]
    fn overlay_adds_labels() {
        let overlay = parse_overlay_str(
            r#"{
                "name": "Play Console",
                "fields": [
                    { "field": "downloads", "labels": ["Store listing acquisitions"] }
                ]
            }"#,
        )
        .unwrap();
        let table = FieldPatternTable::builtin().with_overlay(&overlay).unwrap();
        let rule = table.rule(Field::Downloads).unwrap();
        assert!(rule.labels.iter().any(|l| l == "Store listing acquisitions"));
        // untouched fields keep their rules
        assert_eq!(
            table.rule(Field::Crashes).unwrap().labels,
            FieldPatternTable::builtin().rule(Field::Crashes).unwrap().labels
        );
    }

    #[test]
    fn overlay_with_unknown_field_rejected() {
        let json = r#"{ "name": "Bad", "fields": [ { "field": "bounceRate", "labels": ["Bounce"] } ] }"#;
        assert!(matches!(
            parse_overlay_str(json),
            Err(ReportError::UnknownField(_))
        ));
    }

    #[test]
    fn overlay_with_empty_label_rejected() {
        let json = r#"{ "name": "Bad", "fields": [ { "field": "downloads", "labels": ["  "] } ] }"#;
        assert!(parse_overlay_str(json).is_err());
    }

    #[test]
    fn overlay_with_no_fields_rejected() {
        assert!(parse_overlay_str(r#"{ "name": "Bad", "fields": [] }"#).is_err());
    }

    #[test]
    fn overlay_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.json");
        std::fs::write(
            &path,
            r#"{ "name": "Extra", "fields": [ { "field": "crashes", "aliases": ["Fatal errors"] } ] }"#,
        )
        .unwrap();
        let overlay = load_overlay(&path).unwrap();
        assert_eq!(overlay.fields[0].aliases, vec!["Fatal errors"]);
    }

    #[test]
    fn missing_overlay_file_reports_path() {
        let err = load_overlay(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ReportError::OverlayLoad { .. }));
    }
}
