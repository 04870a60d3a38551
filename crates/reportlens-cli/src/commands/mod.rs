pub mod extract;
pub mod fields;
pub mod number;
pub mod patterns;
