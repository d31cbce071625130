//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::OcrConfig;

use super::{PageOcr, TextBox, layout_text};

/// Detection model file expected in the model directory.
pub const DET_MODEL: &str = "det.onnx";
/// Recognition model file expected in the model directory.
pub const REC_MODEL: &str = "latin_rec.onnx";
/// Character dictionary expected in the model directory.
pub const DICTIONARY: &str = "latin_dict.txt";

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
pub struct PureOcrEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
    keep_unk: bool,
}

impl PureOcrEngine {
    /// Create an engine from the model files in `config.model_dir`.
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        let model_dir = &config.model_dir;
        for file in [DET_MODEL, REC_MODEL, DICTIONARY] {
            if !model_dir.join(file).exists() {
                return Err(OcrError::ModelLoad(format!(
                    "missing {} in {}",
                    file,
                    model_dir.display()
                )));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&model_dir.join(DET_MODEL))
            .rec_model_path(&model_dir.join(REC_MODEL))
            .dictionary_path(&model_dir.join(DICTIONARY))
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self {
            engine,
            keep_unk: config.keep_unk,
        })
    }

    /// Detect and recognize text boxes on an image.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBox>, OcrError> {
        let results = self
            .engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        Ok(results
            .iter()
            .map(|r| TextBox {
                bbox: polygon_to_bbox(&r.bounding_box),
                text: if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                },
            })
            .collect())
    }
}

impl PageOcr for PureOcrEngine {
    fn recognize(&self, page: u32, image: &DynamicImage) -> Result<String, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        debug!("OCR page {}: {}x{}", page, width, height);

        let boxes = self.detect(image)?;
        let count = boxes.len();
        let text = layout_text(boxes);

        info!(
            "OCR page {} complete: {} text boxes in {}ms",
            page,
            count,
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

/// Convert a `Polygon<f64>` to our `[f32; 8]` bbox format.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}
