//! Document text with an OCR fallback for scanned pages.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{PdfExtractor, PdfProcessor};
use crate::error::DocumentError;
use crate::models::config::PdfConfig;
use crate::ocr::PageOcr;

/// Where the returned text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    TextLayer,
    Ocr,
}

/// Text of a whole document, pages joined in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub source: TextSource,
    pub pages: u32,
}

/// Reads the text layer and, when it is too sparse, OCRs page images.
#[derive(Clone)]
pub struct TextExtractor {
    min_text_chars: usize,
    max_pages: usize,
    ocr: Option<Arc<dyn PageOcr>>,
}

impl TextExtractor {
    pub fn new(config: &PdfConfig) -> Self {
        Self {
            min_text_chars: config.min_text_chars,
            max_pages: config.max_pages,
            ocr: None,
        }
    }

    /// Attach an OCR engine for sparse documents.
    pub fn with_ocr(mut self, ocr: Arc<dyn PageOcr>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Extract the text of a PDF.
    pub fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, DocumentError> {
        let mut pdf = PdfExtractor::new();
        pdf.load(bytes)?;

        let mut pages = pdf.page_count();
        if self.max_pages > 0 {
            pages = pages.min(self.max_pages as u32);
        }

        let direct = match pdf.extract_pages_text() {
            Ok(texts) => join_pages(texts.into_iter().take(pages as usize)),
            Err(e) => {
                warn!("Text layer extraction failed: {}", e);
                String::new()
            }
        };

        let direct_chars = significant_chars(&direct);
        debug!("Text layer: {} pages, {} significant chars", pages, direct_chars);

        if direct_chars >= self.min_text_chars {
            return Ok(ExtractedText {
                text: direct,
                source: TextSource::TextLayer,
                pages,
            });
        }

        let mut best = ExtractedText {
            text: direct,
            source: TextSource::TextLayer,
            pages,
        };

        if let Some(ocr) = &self.ocr {
            info!("Text layer too sparse ({} < {}), running OCR", direct_chars, self.min_text_chars);
            let ocr_text = ocr_pages(&pdf, ocr.as_ref(), pages);

            if significant_chars(&ocr_text) > direct_chars {
                best.text = ocr_text;
                best.source = TextSource::Ocr;
            }
        }

        if best.text.trim().is_empty() {
            return Err(DocumentError::InsufficientText);
        }
        Ok(best)
    }
}

/// OCR every page once, in order. Pages the engine fails on contribute no text.
fn ocr_pages(pdf: &PdfExtractor, ocr: &dyn PageOcr, pages: u32) -> String {
    let texts = (1..=pages).filter_map(|page| {
        let image = match pdf.render_page(page) {
            Ok(image) => image,
            Err(e) => {
                warn!("Could not render page {}: {}", page, e);
                return None;
            }
        };
        match ocr.recognize(page, &image) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("OCR failed on page {}: {}", page, e);
                None
            }
        }
    });
    join_pages(texts)
}

fn join_pages(pages: impl Iterator<Item = String>) -> String {
    pages
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn significant_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}
