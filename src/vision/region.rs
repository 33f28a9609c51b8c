//! Detected text regions and normalized image geometry
//!
//! All coordinates are normalized to [0, 1] with the origin at the
//! bottom-left corner of the image, so "higher on the page" means a
//! larger `y`.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in normalized, bottom-left-origin coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    /// Left edge
    pub min_x: f64,
    /// Bottom edge
    pub min_y: f64,
    /// Right edge
    pub max_x: f64,
    /// Top edge
    pub max_y: f64,
}

impl NormalizedRect {
    /// Create a rectangle from its edges.
    ///
    /// Edges are clamped to [0, 1] and swapped if given in the wrong order.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        let (min_x, max_x) = ordered(clamp_unit(min_x), clamp_unit(max_x));
        let (min_y, max_y) = ordered(clamp_unit(min_y), clamp_unit(max_y));
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Convert a pixel rectangle measured from the top-left corner of an
    /// image (the convention of most raster APIs) into normalized
    /// bottom-left coordinates.
    pub fn from_top_left_pixels(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let w = f64::from(image_width.max(1));
        let h = f64::from(image_height.max(1));
        Self::new(x / w, 1.0 - (y + height) / h, (x + width) / w, 1.0 - y / h)
    }

    /// Pixel rectangle `(x, y, width, height)` measured from the top-left
    /// corner of an `image_width` x `image_height` image.
    ///
    /// Edges are rounded outward and the result always covers at least one
    /// pixel inside the image.
    pub fn to_top_left_pixels(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        let left = (self.min_x * w).floor() as u32;
        let right = (self.max_x * w).ceil() as u32;
        let top = ((1.0 - self.max_y) * h).floor() as u32;
        let bottom = ((1.0 - self.min_y) * h).ceil() as u32;

        let x = left.min(image_width.saturating_sub(1));
        let y = top.min(image_height.saturating_sub(1));
        let width = right.min(image_width).saturating_sub(x).max(1);
        let height = bottom.min(image_height).saturating_sub(y).max(1);
        (x, y, width, height)
    }

    /// The whole image
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Top edge (`max_y`), the key used for reading order
    pub fn top(&self) -> f64 {
        self.max_y
    }

    /// Left edge (`min_x`)
    pub fn left(&self) -> f64 {
        self.min_x
    }
}

impl Default for NormalizedRect {
    fn default() -> Self {
        Self::full()
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// One candidate transcription of a region
#[derive(Debug, Clone, PartialEq)]
pub struct TextCandidate {
    /// Candidate string
    pub text: String,
    /// Engine confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl TextCandidate {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// A span of text detected by the recognition engine
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    bounds: NormalizedRect,
    candidates: Vec<TextCandidate>,
}

impl TextRegion {
    /// Create a region; candidates are kept sorted by descending confidence.
    pub fn new(bounds: NormalizedRect, mut candidates: Vec<TextCandidate>) -> Self {
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self { bounds, candidates }
    }

    /// Region with a single candidate
    pub fn single(bounds: NormalizedRect, text: impl Into<String>, confidence: f32) -> Self {
        Self::new(bounds, vec![TextCandidate::new(text, confidence)])
    }

    pub fn bounds(&self) -> &NormalizedRect {
        &self.bounds
    }

    /// Candidates, best first
    pub fn candidates(&self) -> &[TextCandidate] {
        &self.candidates
    }

    /// Highest-confidence candidate, if the engine produced any
    pub fn top_candidate(&self) -> Option<&TextCandidate> {
        self.candidates.first()
    }
}
