use reportlens_core::error::ReportError;
use reportlens_core::model::Field;
use reportlens_core::parsing::format_magnitude;
use reportlens_core::rules::FieldPatternTable;

pub fn list() -> Result<(), ReportError> {
    let table = FieldPatternTable::builtin();
    println!("Recognized fields:\n");

    let max_key = table
        .rules()
        .iter()
        .map(|r| r.field.key().len())
        .max()
        .unwrap_or(12);

    for rule in table.rules() {
        let core = if rule.field.is_core() { " *" } else { "" };
        println!(
            "  {:<width$}  {:<8} {}{}",
            rule.field.key(),
            rule.kind.to_string(),
            rule.labels.join(", "),
            core,
            width = max_key
        );
    }
    println!("\n  * core field, weighs double in the overall confidence");
    Ok(())
}

pub fn explain(key: &str) -> Result<(), ReportError> {
    let field = Field::from_key(key).ok_or_else(|| ReportError::UnknownField(key.to_string()))?;
    let table = FieldPatternTable::builtin();
    let rule = table
        .rule(field)
        .ok_or_else(|| ReportError::UnknownField(key.to_string()))?;

    println!("{} ({})\n", field.key(), rule.kind);

    println!("Primary labels (full confidence):");
    for label in &rule.labels {
        println!("  {label}");
    }
    println!();

    if !rule.aliases.is_empty() {
        println!("Alias labels (confidence x 0.85):");
        for alias in &rule.aliases {
            println!("  {alias}");
        }
        println!();
    }

    if !rule.reject_prefixes.is_empty() {
        println!(
            "A match is ignored when the label is preceded by: {}\n",
            rule.reject_prefixes.join(", ")
        );
    }

    println!("Each label is tried in these shapes:");
    println!("  Inline     Label: 10,245 (+12%)");
    println!("  Block      Label / info glyph / value / change on separate lines");
    println!("  Sentence   Label increased by 12% to 10,245");
    println!("  Trailing   10,245 Label (alias tier only)\n");

    if rule.derivations.is_empty() {
        println!("Not derived from other fields.\n");
    } else {
        println!("When not found in the text, derived as:");
        for d in &rule.derivations {
            println!("  {} = {}", field.key(), d.expression);
        }
        println!();
    }

    let range = rule.range;
    let max = if range.max.is_finite() {
        format_magnitude(range.max)
    } else {
        "unbounded".to_string()
    };
    println!(
        "Plausible range: {} to {} (unusual above {})",
        format_magnitude(range.min),
        max,
        format_magnitude(range.typical_max)
    );
    println!("  in range: confidence 95, unusual: 60, out of range: 25");
    println!();

    Ok(())
}
