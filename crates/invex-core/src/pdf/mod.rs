//! PDF processing module.

mod extractor;
mod text;

pub use extractor::PdfExtractor;
pub use text::{ExtractedText, TextExtractor, TextSource};

use crate::error::PdfError;
use image::DynamicImage;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract the text layer, one entry per page in page order.
    fn extract_pages_text(&self) -> Result<Vec<String>>;

    /// Render a page (1-indexed) as an image for OCR.
    fn render_page(&self, page: u32) -> Result<DynamicImage>;
}
