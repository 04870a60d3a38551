use reportlens_core::error::ReportError;
use reportlens_core::model::ExtractionResult;

pub fn print(result: &ExtractionResult) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{json}");
    Ok(())
}
