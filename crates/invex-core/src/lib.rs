//! Core library for GST invoice extraction.
//!
//! This crate provides:
//! - PDF text extraction with an OCR fallback for scanned pages
//! - LLM field extraction (Google Gemini, OpenAI) with a regex fallback
//! - Normalization into invoice and line-item records
//! - Two-file CSV output per document
//! - Batch processing with a shared job-status store

pub mod batch;
pub mod error;
pub mod invoice;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod output;
pub mod pdf;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchHandle, BatchRunner, DocumentOutcome, DocumentState, JobId, JobRecord, JobState, JobStore};
pub use error::{DocumentError, DocumentErrorKind, InvexError, LlmError, Result};
pub use invoice::llm::{Credentials, LlmFieldExtractor, Provider};
pub use invoice::{FieldExtractor, RegexFieldExtractor};
pub use models::config::InvexConfig;
pub use models::invoice::{ExtractionMethod, InvoiceRecord, LineItemRecord, RawExtraction};
pub use normalize::{NormalizationWarning, NormalizedInvoice, Normalizer};
pub use ocr::PageOcr;
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use output::{CsvOutput, CsvWriter};
pub use pdf::{ExtractedText, TextExtractor, TextSource};
pub use pipeline::{Pipeline, ProcessedDocument, serial_number};
