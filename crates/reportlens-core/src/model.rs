use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder for string leaves that could not be extracted.
pub const NOT_SPECIFIED: &str = "Not specified";

/// A known metric key. Declaration order is the output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Impressions,
    PageViews,
    ConversionRate,
    Downloads,
    Redownloads,
    Proceeds,
    PayingUsers,
    Arppu,
    Arpd,
    Sessions,
    ActiveDevices,
    SessionsPerDevice,
    Crashes,
    CrashRate,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Impressions,
        Field::PageViews,
        Field::ConversionRate,
        Field::Downloads,
        Field::Redownloads,
        Field::Proceeds,
        Field::PayingUsers,
        Field::Arppu,
        Field::Arpd,
        Field::Sessions,
        Field::ActiveDevices,
        Field::SessionsPerDevice,
        Field::Crashes,
        Field::CrashRate,
    ];

    /// Fields weighted more heavily in the overall confidence.
    pub const CORE: [Field; 4] = [
        Field::Downloads,
        Field::Proceeds,
        Field::ConversionRate,
        Field::Impressions,
    ];

    /// The camelCase key used in JSON output and overlay files.
    pub fn key(&self) -> &'static str {
        match self {
            Field::Impressions => "impressions",
            Field::PageViews => "pageViews",
            Field::ConversionRate => "conversionRate",
            Field::Downloads => "downloads",
            Field::Redownloads => "redownloads",
            Field::Proceeds => "proceeds",
            Field::PayingUsers => "payingUsers",
            Field::Arppu => "arppu",
            Field::Arpd => "arpd",
            Field::Sessions => "sessions",
            Field::ActiveDevices => "activeDevices",
            Field::SessionsPerDevice => "sessionsPerDevice",
            Field::Crashes => "crashes",
            Field::CrashRate => "crashRate",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::ConversionRate | Field::CrashRate => FieldKind::Percent,
            Field::Proceeds | Field::Arppu | Field::Arpd => FieldKind::Currency,
            Field::SessionsPerDevice => FieldKind::Ratio,
            _ => FieldKind::Count,
        }
    }

    pub fn is_core(&self) -> bool {
        Field::CORE.contains(self)
    }

    /// Look up a field by key, tolerating case, `_` and `-`.
    ///
    /// "page_views", "PageViews" and "page-views" all resolve to `PageViews`.
    pub fn from_key(s: &str) -> Option<Field> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.key().to_lowercase() == wanted)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Drives the plausibility range a field is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Count,
    Currency,
    Percent,
    Ratio,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Count => write!(f, "count"),
            FieldKind::Currency => write!(f, "currency"),
            FieldKind::Percent => write!(f, "percent"),
            FieldKind::Ratio => write!(f, "ratio"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub value: f64,
    /// Percentage change versus the previous period; 0 when not shown.
    pub change: f64,
    pub confidence: u8,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub extracted: bool,
    pub calculated: bool,
}

impl Metric {
    /// Zero-valued placeholder for a field nothing could fill.
    pub fn missing() -> Self {
        Self {
            value: 0.0,
            change: 0.0,
            confidence: 0,
            warnings: Vec::new(),
            extracted: false,
            calculated: false,
        }
    }

    pub fn extracted(value: f64, change: f64, confidence: u8, warnings: Vec<String>) -> Self {
        Self {
            value,
            change,
            confidence: confidence.min(100),
            warnings,
            extracted: true,
            calculated: false,
        }
    }

    pub fn calculated(value: f64, confidence: u8, warnings: Vec<String>) -> Self {
        Self {
            value,
            change: 0.0,
            confidence: confidence.min(100),
            warnings,
            extracted: false,
            calculated: true,
        }
    }

    /// True if the value came from the text or from a formula.
    pub fn is_known(&self) -> bool {
        self.extracted || self.calculated
    }
}

impl Default for Metric {
    fn default() -> Self {
        Self::missing()
    }
}

/// Field → metric mapping, ordered by field declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<Field, Metric>);

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding a zero-valued placeholder for every given field.
    pub fn with_defaults(fields: impl IntoIterator<Item = Field>) -> Self {
        Self(fields.into_iter().map(|f| (f, Metric::missing())).collect())
    }

    pub fn get(&self, field: Field) -> Option<&Metric> {
        self.0.get(&field)
    }

    /// Value of a known field; placeholders count as unknown.
    pub fn value(&self, field: Field) -> Option<f64> {
        self.0
            .get(&field)
            .filter(|m| m.is_known())
            .map(|m| m.value)
    }

    pub fn is_known(&self, field: Field) -> bool {
        self.value(field).is_some()
    }

    pub fn insert(&mut self, field: Field, metric: Metric) {
        self.0.insert(field, metric);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &Metric)> {
        self.0.iter().map(|(f, m)| (*f, m))
    }

    pub fn known(&self) -> impl Iterator<Item = (Field, &Metric)> {
        self.iter().filter(|(_, m)| m.is_known())
    }

    pub fn known_count(&self) -> usize {
        self.known().count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add placeholders for any of `fields` not already present.
    pub fn fill_missing(&mut self, fields: impl IntoIterator<Item = Field>) {
        for field in fields {
            self.0.entry(field).or_insert_with(Metric::missing);
        }
    }
}

/// One row of a breakdown table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub label: String,
    pub percentage: f64,
    pub count: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distributions {
    pub markets: Vec<DistributionEntry>,
    pub devices: Vec<DistributionEntry>,
    pub sources: Vec<DistributionEntry>,
    /// Keyword tables; shares are not expected to sum to 100.
    pub keywords: Vec<DistributionEntry>,
}

impl Distributions {
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
            && self.devices.is_empty()
            && self.sources.is_empty()
            && self.keywords.is_empty()
    }

    pub fn list(&self, kind: BreakdownKind) -> &Vec<DistributionEntry> {
        match kind {
            BreakdownKind::Markets => &self.markets,
            BreakdownKind::Devices => &self.devices,
            BreakdownKind::Sources => &self.sources,
            BreakdownKind::Keywords => &self.keywords,
        }
    }

    pub fn list_mut(&mut self, kind: BreakdownKind) -> &mut Vec<DistributionEntry> {
        match kind {
            BreakdownKind::Markets => &mut self.markets,
            BreakdownKind::Devices => &mut self.devices,
            BreakdownKind::Sources => &mut self.sources,
            BreakdownKind::Keywords => &mut self.keywords,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakdownKind {
    Markets,
    Devices,
    Sources,
    Keywords,
}

impl BreakdownKind {
    pub const ALL: [BreakdownKind; 4] = [
        BreakdownKind::Markets,
        BreakdownKind::Devices,
        BreakdownKind::Sources,
        BreakdownKind::Keywords,
    ];

    /// Whether the list's percentages are expected to add up to 100.
    pub fn sums_to_whole(&self) -> bool {
        !matches!(self, BreakdownKind::Keywords)
    }
}

impl fmt::Display for BreakdownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakdownKind::Markets => write!(f, "markets"),
            BreakdownKind::Devices => write!(f, "devices"),
            BreakdownKind::Sources => write!(f, "sources"),
            BreakdownKind::Keywords => write!(f, "keywords"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RetentionDay {
    #[serde(rename = "day1")]
    Day1,
    #[serde(rename = "day7")]
    Day7,
    #[serde(rename = "day14")]
    Day14,
    #[serde(rename = "day28")]
    Day28,
}

impl RetentionDay {
    /// Horizons in increasing order.
    pub const ALL: [RetentionDay; 4] = [
        RetentionDay::Day1,
        RetentionDay::Day7,
        RetentionDay::Day14,
        RetentionDay::Day28,
    ];

    pub fn days(&self) -> u32 {
        match self {
            RetentionDay::Day1 => 1,
            RetentionDay::Day7 => 7,
            RetentionDay::Day14 => 14,
            RetentionDay::Day28 => 28,
        }
    }

    pub fn from_days(days: u32) -> Option<RetentionDay> {
        RetentionDay::ALL.iter().copied().find(|d| d.days() == days)
    }
}

impl fmt::Display for RetentionDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day{}", self.days())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionPoint {
    pub value: f64,
    /// Peer benchmark; 0 when the report shows none.
    pub benchmark: f64,
    pub present: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionCurve {
    pub day1: RetentionPoint,
    pub day7: RetentionPoint,
    pub day14: RetentionPoint,
    pub day28: RetentionPoint,
}

impl RetentionCurve {
    pub fn get(&self, day: RetentionDay) -> &RetentionPoint {
        match day {
            RetentionDay::Day1 => &self.day1,
            RetentionDay::Day7 => &self.day7,
            RetentionDay::Day14 => &self.day14,
            RetentionDay::Day28 => &self.day28,
        }
    }

    pub fn set(&mut self, day: RetentionDay, value: f64, benchmark: Option<f64>) {
        let point = match day {
            RetentionDay::Day1 => &mut self.day1,
            RetentionDay::Day7 => &mut self.day7,
            RetentionDay::Day14 => &mut self.day14,
            RetentionDay::Day28 => &mut self.day28,
        };
        *point = RetentionPoint {
            value,
            benchmark: benchmark.unwrap_or(0.0),
            present: true,
        };
    }

    /// Present horizons in increasing order.
    pub fn present(&self) -> Vec<(RetentionDay, RetentionPoint)> {
        RetentionDay::ALL
            .iter()
            .map(|d| (*d, *self.get(*d)))
            .filter(|(_, p)| p.present)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub title: String,
    pub date_range: String,
    pub executive_summary: String,
}

impl Default for ReportSummary {
    fn default() -> Self {
        Self {
            title: NOT_SPECIFIED.to_string(),
            date_range: NOT_SPECIFIED.to_string(),
            executive_summary: NOT_SPECIFIED.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    pub completeness: u8,
    pub overall_confidence: u8,
    pub missing_fields: Vec<String>,
    pub extractor_used: String,
    /// Field key → "<extractor>/<tier>".
    pub field_sources: BTreeMap<String, String>,
    /// Layout detected by format sniffing.
    pub format: String,
    pub warnings: Vec<String>,
}

impl Default for ExtractionMetadata {
    fn default() -> Self {
        Self {
            completeness: 0,
            overall_confidence: 0,
            missing_fields: Vec::new(),
            extractor_used: "none".to_string(),
            field_sources: BTreeMap::new(),
            format: NOT_SPECIFIED.to_string(),
            warnings: Vec::new(),
        }
    }
}

/// Final output of one extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub metrics: MetricSet,
    pub distributions: Distributions,
    pub retention: RetentionCurve,
    pub summary: ReportSummary,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub metadata: ExtractionMetadata,
}

impl ExtractionResult {
    /// A failed result with every field zero-valued.
    pub fn failure(
        error: impl Into<String>,
        warnings: Vec<String>,
        fields: impl IntoIterator<Item = Field> + Clone,
    ) -> Self {
        let metadata = ExtractionMetadata {
            missing_fields: fields.clone().into_iter().map(|f| f.key().to_string()).collect(),
            warnings: warnings.clone(),
            ..ExtractionMetadata::default()
        };
        Self {
            metrics: MetricSet::with_defaults(fields),
            distributions: Distributions::default(),
            retention: RetentionCurve::default(),
            summary: ReportSummary::default(),
            success: false,
            error: Some(error.into()),
            warnings,
            metadata,
        }
    }
}
