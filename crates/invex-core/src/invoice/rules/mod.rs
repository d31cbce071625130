//! Rule-based field extractors for GST invoices.

pub mod amounts;
pub mod dates;
pub mod gstin;
pub mod patterns;
pub mod table;

pub use amounts::{parse_amount, AmountExtractor};
pub use dates::{normalize_date, DateExtractor};
pub use gstin::{validate_gstin, GstinExtractor};
pub use table::extract_line_items;

/// A single-field extractor driven by an ordered list of patterns.
pub trait RuleExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the first occurrence of the field.
    fn extract(&self, text: &str) -> Option<Self::Output>;
}

/// Return capture group 1 of the first pattern that matches, trimmed.
///
/// Patterns are tried in order, so earlier patterns take precedence even
/// when a later one matches further up in the text.
pub fn first_capture(patterns: &[regex::Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern.captures_iter(text).find_map(|caps| {
            let value = caps.get(1)?.as_str().trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    })
}
