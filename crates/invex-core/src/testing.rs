//! Test fixtures: synthesized PDFs and an instrumented OCR engine.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use parking_lot::Mutex;

use crate::error::{LlmError, OcrError};
use crate::invoice::llm::{ChatRequest, ChatTransport, Credentials};
use crate::ocr::PageOcr;

/// A small GST invoice readable by the rule-based extractor.
pub const SAMPLE_INVOICE_LINES: &[&str] = &[
    "TAX INVOICE",
    "Supplier: Acme Traders Pvt Ltd",
    "GSTIN: 27AAPFU0939F1ZV",
    "Invoice No: INV-2024-001",
    "Invoice Date: 15/03/2024",
    "Buyer: Bharat Retail LLP",
    "GSTIN: 29AAGCB7383J1Z4",
    "Taxable Value: 1,046.24",
    "CGST @ 9%: 94.16",
    "SGST @ 9%: 94.16",
    "Total: 1,234.56",
];

/// Build a PDF with one text page per entry of `pages`.
pub fn text_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids = pages
        .iter()
        .map(|lines| {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![50.into(), 780.into()]),
            ];
            for line in lines.iter() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations }.encode().unwrap();
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            add_page(&mut doc, pages_id, content_id, resources_id)
        })
        .collect::<Vec<_>>();

    finish(doc, pages_id, kids)
}

/// Build a PDF of `page_count` image-only pages, each holding one 8x4 grayscale image.
pub fn scanned_pdf(page_count: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let pixels: Vec<u8> = (0..32u8).map(|i| i * 8).collect();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 8,
            "Height" => 4,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        pixels,
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    let kids = (0..page_count)
        .map(|_| {
            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new("cm", vec![400.into(), 0.into(), 0.into(), 200.into(), 50.into(), 500.into()]),
                    Operation::new("Do", vec!["Im0".into()]),
                    Operation::new("Q", vec![]),
                ],
            }
            .encode()
            .unwrap();
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            add_page(&mut doc, pages_id, content_id, resources_id)
        })
        .collect::<Vec<_>>();

    finish(doc, pages_id, kids)
}

fn add_page(doc: &mut Document, pages_id: ObjectId, content_id: ObjectId, resources_id: ObjectId) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    })
}

fn finish(mut doc: Document, pages_id: ObjectId, kids: Vec<ObjectId>) -> Vec<u8> {
    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids.into_iter().map(Object::from).collect::<Vec<_>>(),
        "Count" => count,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// OCR engine that returns fixed text and records which pages it saw.
pub struct CountingOcr {
    text: String,
    pages: Mutex<Vec<u32>>,
}

impl CountingOcr {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            pages: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn pages_seen(&self) -> Vec<u32> {
        self.pages.lock().clone()
    }
}

impl PageOcr for CountingOcr {
    fn recognize(&self, page: u32, _image: &DynamicImage) -> Result<String, OcrError> {
        self.pages.lock().push(page);
        Ok(self.text.clone())
    }
}

/// Chat transport that answers every request with the same reply.
pub struct FixedTransport {
    reply: String,
    calls: AtomicUsize,
}

impl FixedTransport {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for FixedTransport {
    async fn complete(&self, _request: &ChatRequest<'_>, _credentials: &Credentials) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}
