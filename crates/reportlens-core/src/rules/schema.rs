use serde::{Deserialize, Serialize};

/// A JSON overlay that adds labels to the builtin pattern table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternOverlayDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub fields: Vec<FieldLabelsDef>,
}

/// Extra labels for one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldLabelsDef {
    /// Field key, e.g. "downloads" or "pageViews".
    pub field: String,
    /// Added to the primary tier.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Added to the alias tier.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Words that disqualify a label match when they directly precede it.
    #[serde(default)]
    pub reject_prefixes: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}
