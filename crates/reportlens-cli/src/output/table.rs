use reportlens_core::model::{BreakdownKind, ExtractionResult, NOT_SPECIFIED};
use reportlens_core::parsing::format_magnitude;

pub fn print(result: &ExtractionResult) {
    if !result.success {
        println!(
            "  Extraction failed: {}\n",
            result.error.as_deref().unwrap_or("unknown error")
        );
        print_warnings(&result.metadata.warnings);
        return;
    }

    println!("=== {} ===\n", result.summary.title);
    println!("  Period:     {}", result.summary.date_range);
    println!(
        "  Extractor:  {} ({} layout)",
        result.metadata.extractor_used, result.metadata.format
    );
    println!(
        "  Confidence: {}%   Completeness: {}%\n",
        result.metadata.overall_confidence, result.metadata.completeness
    );

    let max_name = result
        .metrics
        .known()
        .map(|(f, _)| f.key().len())
        .max()
        .unwrap_or(10);

    for (field, metric) in result.metrics.known() {
        let origin = if metric.calculated { " (derived)" } else { "" };
        let change = if metric.change == 0.0 {
            String::new()
        } else {
            format!("  {:+}%", metric.change)
        };
        println!(
            "  {:<width$}  {:>10}{}  [{}]{}",
            field.key(),
            format_magnitude(metric.value),
            change,
            metric.confidence,
            origin,
            width = max_name
        );
        for w in &metric.warnings {
            println!("    {w}");
        }
    }
    println!();

    if !result.metadata.missing_fields.is_empty() {
        println!("  Not found: {}\n", result.metadata.missing_fields.join(", "));
    }

    for kind in BreakdownKind::ALL {
        let entries = result.distributions.list(kind);
        if entries.is_empty() {
            continue;
        }
        println!("  Top {kind}:");
        for e in entries {
            if e.count > 0.0 {
                println!(
                    "    {:<24} {:>5.1}%  ({})",
                    e.label,
                    e.percentage,
                    format_magnitude(e.count)
                );
            } else {
                println!("    {:<24} {:>5.1}%", e.label, e.percentage);
            }
        }
        println!();
    }

    let retention = result.retention.present();
    if !retention.is_empty() {
        println!("  Retention:");
        for (day, point) in retention {
            if point.benchmark > 0.0 {
                println!(
                    "    {:<6} {:>5.1}%  (benchmark {}%)",
                    day.to_string(),
                    point.value,
                    point.benchmark
                );
            } else {
                println!("    {:<6} {:>5.1}%", day.to_string(), point.value);
            }
        }
        println!();
    }

    if result.summary.executive_summary != NOT_SPECIFIED {
        println!("  Summary: {}\n", result.summary.executive_summary);
    }

    print_warnings(&result.metadata.warnings);
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("  Warnings:");
    for w in warnings {
        println!("    - {w}");
    }
    println!();
}
