use reportlens_core::error::ReportError;
use reportlens_core::parsing::{format_magnitude, parse_magnitude, parse_signed_percent};

pub fn run(text: &str) -> Result<(), ReportError> {
    let (magnitude, percent) = match (parse_magnitude(text), parse_signed_percent(text)) {
        (Err(e), Err(_)) => return Err(e),
        pair => pair,
    };

    println!("Input:      {text}");
    match magnitude {
        Ok(v) => println!("Magnitude:  {v} ({})", format_magnitude(v)),
        Err(e) => println!("Magnitude:  - ({e})"),
    }
    match percent {
        Ok(v) => println!("As change:  {v:+}%"),
        Err(e) => println!("As change:  - ({e})"),
    }
    Ok(())
}
