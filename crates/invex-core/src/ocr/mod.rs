//! OCR fallback for scanned pages.

#[cfg(feature = "native")]
mod pure_engine;

#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// Recognizes the text of one rendered page.
pub trait PageOcr: Send + Sync {
    /// `page` is 1-indexed and only used for diagnostics.
    fn recognize(&self, page: u32, image: &DynamicImage) -> Result<String, OcrError>;
}

/// A detected text box with its coordinates and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Bounding box coordinates (x1, y1, x2, y2, x3, y3, x4, y4) for quadrilateral.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,
}

impl TextBox {
    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }

    fn center_y(&self) -> f32 {
        let (_, min_y, _, max_y) = self.rect();
        (min_y + max_y) / 2.0
    }
}

/// Lay out recognized boxes as text lines in reading order.
///
/// Boxes whose vertical centers fall within half a line height of a row's
/// first box share that row; rows are joined with newlines and the boxes of
/// a row with single spaces, left to right.
pub fn layout_text(mut boxes: Vec<TextBox>) -> String {
    boxes.retain(|b| !b.text.trim().is_empty());
    boxes.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));

    let mut rows: Vec<Vec<TextBox>> = Vec::new();
    for text_box in boxes {
        let joins_row = rows.last().and_then(|row| row.first()).is_some_and(|first| {
            let (_, top, _, bottom) = first.rect();
            let tolerance = ((bottom - top) / 2.0).max(1.0);
            (text_box.center_y() - first.center_y()).abs() <= tolerance
        });

        match rows.last_mut() {
            Some(row) if joins_row => row.push(text_box),
            _ => rows.push(vec![text_box]),
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.rect().0.total_cmp(&b.rect().0));
            row.iter().map(|b| b.text.trim()).collect::<Vec<_>>().join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
