use reportlens_core::error::ReportError;
use reportlens_core::model::Field;
use reportlens_core::rules::{load_overlay, FieldPatternTable};
use std::path::Path;

pub fn schema() -> Result<(), ReportError> {
    print!(
        r#"Pattern Overlay Schema
======================

An overlay file adds labels to the builtin field table, for reports that
name metrics differently (other languages, custom dashboards). Labels are
matched case-insensitively in every shape `reportlens fields explain`
lists.

Top-level fields:
  name          (string, required)  Name shown in logs
  description   (string, optional)  What the overlay is for
  fields        (array, required)   One entry per field to extend

Each entry in the "fields" array:
  field             (string, required)  Field key, e.g. "downloads" or
                                        "pageViews". Run `reportlens fields
                                        list` to see every key.
  labels            (array, optional)   Added to the primary tier
  aliases           (array, optional)   Added to the alias tier, matched
                                        only when no primary label is found
  reject_prefixes   (array, optional)   Words that disqualify a match when
                                        they directly precede the label
  note              (string, optional)  Free-form comment

Each entry must add at least one label, alias or reject prefix.

Example:
{{
  "name": "German dashboard",
  "description": "Labels from the German App Store Connect UI",
  "fields": [
    {{
      "field": "downloads",
      "labels": ["Erstmalige Downloads", "Downloads gesamt"]
    }},
    {{
      "field": "proceeds",
      "labels": ["Erlöse"],
      "aliases": ["Umsatz"]
    }}
  ]
}}
"#
    );
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), ReportError> {
    let overlay = load_overlay(file)?;
    // Compiling catches labels that do not form a valid pattern.
    FieldPatternTable::builtin().with_overlay(&overlay)?;

    println!("Overlay '{}' is valid.", overlay.name);
    println!("  Fields: {}", overlay.fields.len());

    let mut warnings = Vec::new();
    for def in &overlay.fields {
        let Some(field) = Field::from_key(&def.field) else {
            continue;
        };
        if def.field != field.key() {
            warnings.push(format!(
                "field '{}' resolved to '{}'; prefer the canonical key",
                def.field,
                field.key()
            ));
        }
        let Some(rule) = FieldPatternTable::builtin().rule(field) else {
            continue;
        };
        for label in &def.labels {
            if rule.labels.iter().any(|l| l.eq_ignore_ascii_case(label)) {
                warnings.push(format!(
                    "label '{label}' is already a builtin label of '{}'",
                    field.key()
                ));
            }
        }
    }

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {w}");
        }
    }

    Ok(())
}
