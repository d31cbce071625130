//! Invoice field extraction module.

pub mod llm;
mod parser;
pub mod rules;

pub use parser::RegexFieldExtractor;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::models::invoice::{ExtractionMethod, RawExtraction};
use llm::Credentials;

/// Turns raw document text into a raw field mapping.
///
/// Implemented by the LLM extractor and by the regex fallback, so callers
/// can hold either behind `dyn FieldExtractor`.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    /// Which extractor this is, recorded in the output remarks.
    fn method(&self) -> ExtractionMethod;

    /// Extract header fields and line items from `text`.
    ///
    /// Credentials are resolved by the caller; extractors never read the
    /// environment.
    async fn extract_fields(&self, text: &str, credentials: Option<&Credentials>) -> Result<RawExtraction, LlmError>;
}
