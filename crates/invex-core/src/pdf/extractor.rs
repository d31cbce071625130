//! PDF text and image extraction using lopdf and pdf-extract.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Luma, Rgb, RgbImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    /// Decode the images a page draws, with where it draws them.
    fn placed_images(&self, doc: &Document, page_id: ObjectId, page: u32) -> Vec<Placement> {
        let mut placed = Vec::new();

        let Some(resources) = self.get_page_resources(doc, page_id) else {
            return placed;
        };
        let xobjects = match resources.get(b"XObject").and_then(|o| doc.dereference(o)) {
            Ok((_, Object::Dictionary(dict))) => dict,
            _ => return placed,
        };

        let content = doc
            .get_page_content(page_id)
            .map_err(|e| e.to_string())
            .and_then(|bytes| Content::decode(&bytes).map_err(|e| e.to_string()));
        let content = match content {
            Ok(content) => content,
            Err(e) => {
                warn!("Page {} content stream unreadable: {}", page, e);
                return placed;
            }
        };

        let mut ctm = IDENTITY;
        let mut stack = Vec::new();

        for op in &content.operations {
            match op.operator.as_str() {
                "q" => stack.push(ctm),
                "Q" => ctm = stack.pop().unwrap_or(IDENTITY),
                "cm" => {
                    let values: Vec<f32> = op.operands.iter().filter_map(|o| o.as_float().ok()).collect();
                    if let Ok(m) = <[f32; 6]>::try_from(values) {
                        ctm = concat(&m, &ctm);
                    }
                }
                "Do" => {
                    let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    let image = xobjects
                        .get(name)
                        .ok()
                        .and_then(|o| doc.dereference(o).ok())
                        .and_then(|(_, obj)| self.try_extract_image_from_object(doc, obj));
                    match image {
                        Some(image) => placed.push(Placement { image, rect: unit_square(&ctm) }),
                        None => trace!("Skipping XObject {} on page {}", String::from_utf8_lossy(name), page),
                    }
                }
                _ => {}
            }
        }

        placed
    }

    fn try_extract_image_from_object(&self, doc: &Document, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

        trace!("Found image object: {}x{}", width, height);

        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                _ => None,
            };

            match filter_name {
                Some(b"DCTDecode") => {
                    return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
                }
                Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("Unsupported image filter {:?}", filter_name.map(String::from_utf8_lossy));
                    return None;
                }
                _ => {}
            }
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);

        if bits != 8 {
            trace!("Unsupported bits per component: {}", bits);
            return None;
        }

        decode_raw(&data, width, height, color_space)
    }

    /// Get resources dictionary for a page, handling inheritance.
    fn get_page_resources(&self, doc: &Document, node_id: ObjectId) -> Option<Dictionary> {
        let Object::Dictionary(dict) = doc.get_object(node_id).ok()? else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.get_page_resources(doc, *parent_id),
            _ => None,
        }
    }
}

/// An image drawn on a page and its bounding box in page space.
struct Placement {
    image: DynamicImage,
    rect: [f32; 4],
}

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Default page size (US Letter) when no MediaBox is found.
const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Render resolution bounds in pixels per point.
const MIN_SCALE: f32 = 1.0;
const MAX_SCALE: f32 = 4.0;

/// Longest canvas side in pixels.
const MAX_CANVAS_SIDE: f32 = 8000.0;

/// `m` applied before `n`, as `cm` does with the current matrix.
fn concat(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

/// Bounding box of the unit square under `m`, as `[x0, y0, x1, y1]`.
fn unit_square(m: &Matrix) -> [f32; 4] {
    let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(x, y)| {
        (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
    });
    corners.iter().fold(
        [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY],
        |[x0, y0, x1, y1], &(x, y)| [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
    )
}

/// MediaBox of a page, inherited from its parents if needed.
fn media_box(doc: &Document, node_id: ObjectId) -> [f32; 4] {
    let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
        return LETTER;
    };

    let own = dict
        .get(b"MediaBox")
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_array().ok())
        .map(|arr| arr.iter().filter_map(|v| v.as_float().ok()).collect::<Vec<_>>())
        .and_then(|values| <[f32; 4]>::try_from(values).ok());

    match (own, dict.get(b"Parent")) {
        (Some([x0, y0, x1, y1]), _) if x0 != x1 && y0 != y1 => [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)],
        (_, Ok(Object::Reference(parent_id))) => media_box(doc, *parent_id),
        _ => LETTER,
    }
}

/// Draw every placed image onto a white page-sized canvas.
///
/// The resolution follows the sharpest image on the page, within
/// `MIN_SCALE..=MAX_SCALE` pixels per point. A page without images renders
/// blank.
fn compose_page(media: [f32; 4], placed: Vec<Placement>) -> DynamicImage {
    let (page_w, page_h) = (media[2] - media[0], media[3] - media[1]);

    let scale = placed
        .iter()
        .map(|p| p.image.width() as f32 / (p.rect[2] - p.rect[0]).max(1.0))
        .fold(MIN_SCALE, f32::max)
        .min(MAX_SCALE)
        .min(MAX_CANVAS_SIDE / page_w.max(page_h));

    let width = (page_w * scale).round().max(1.0) as u32;
    let height = (page_h * scale).round().max(1.0) as u32;
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    for Placement { image, rect } in placed {
        let w = ((rect[2] - rect[0]) * scale).round().clamp(1.0, width as f32) as u32;
        let h = ((rect[3] - rect[1]) * scale).round().clamp(1.0, height as f32) as u32;
        let x = ((rect[0] - media[0]) * scale).round() as i64;
        let y = ((media[3] - rect[3]) * scale).round() as i64;

        let scaled = image.resize_exact(w, h, FilterType::Triangle).to_rgb8();
        imageops::overlay(&mut canvas, &scaled, x, y);
    }

    DynamicImage::ImageRgb8(canvas)
}

/// Build an image from uncompressed 8-bit samples.
fn decode_raw(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize) * (height as usize);

    match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data[..pixels * 3].to_vec()).map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data[..pixels].to_vec()).map(DynamicImage::ImageLuma8)
        }
        _ => {
            trace!(
                "Could not decode image: colorspace={}, data_len={}, pixels={}",
                String::from_utf8_lossy(color_space),
                data.len(),
                pixels
            );
            None
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract reads the decrypted bytes, not the document
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_pages_text(&self) -> Result<Vec<String>> {
        self.document()?;
        pdf_extract::extract_text_from_mem_by_pages(&self.raw_data).map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    fn render_page(&self, page: u32) -> Result<DynamicImage> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        let page_id = *pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let placed = self.placed_images(doc, page_id, page);
        debug!("Compositing {} images on page {}", placed.len(), page);

        Ok(compose_page(media_box(doc, page_id), placed))
    }
}
