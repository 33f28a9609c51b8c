//! Recognition engine abstraction
//!
//! An engine turns one prepared raster into unordered text regions. Engines
//! are synchronous and may block; the batch layer runs them on the blocking
//! thread pool. Implementations must be safe to call from several threads
//! at once.

use image::DynamicImage;

use super::config::{RecognitionConfig, RecognitionLevel};
use super::error::EngineError;
use super::region::{NormalizedRect, TextRegion};
use super::task::Orientation;

/// Which languages the engine should recognize
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageSelection {
    /// Let the engine detect the language
    Automatic,
    /// Ordered BCP-47 tags, most preferred first
    Fixed(Vec<String>),
}

impl LanguageSelection {
    pub fn from_tags(tags: &[String]) -> Self {
        if tags.is_empty() {
            LanguageSelection::Automatic
        } else {
            LanguageSelection::Fixed(tags.to_vec())
        }
    }

    pub fn is_automatic(&self) -> bool {
        matches!(self, LanguageSelection::Automatic)
    }
}

/// Per-request engine parameters derived from a [`RecognitionConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOptions {
    pub languages: LanguageSelection,
    pub level: RecognitionLevel,
    pub uses_language_correction: bool,
    /// Minimum text height as a fraction of image height
    pub minimum_text_height: Option<f32>,
    /// Only text inside this area is reported
    pub region_of_interest: Option<NormalizedRect>,
    /// Extra vocabulary to bias recognition
    pub custom_words: Vec<String>,
}

impl RecognitionOptions {
    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self {
            languages: LanguageSelection::from_tags(config.languages()),
            level: config.recognition_level(),
            uses_language_correction: config.uses_language_correction(),
            minimum_text_height: config.minimum_text_height(),
            region_of_interest: config.region_of_interest(),
            custom_words: config.custom_words().to_vec(),
        }
    }
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self::from_config(&RecognitionConfig::default())
    }
}

/// Text detection and recognition backend
pub trait TextRecognitionEngine: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Load models or system resources ahead of the first request
    fn warm_up(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Detect text in `image`.
    ///
    /// `orientation` describes how the pixels are stored; engines either
    /// honor it or upright the image themselves. Returned regions use
    /// normalized bottom-left-origin coordinates of the upright image and
    /// may be in any order. An image without text yields an empty list,
    /// not an error.
    fn detect_text(
        &self,
        image: &DynamicImage,
        orientation: Orientation,
        options: &RecognitionOptions,
    ) -> Result<Vec<TextRegion>, EngineError>;
}

/// Engine that never finds any text
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEngine;

impl TextRecognitionEngine for NoopEngine {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn detect_text(
        &self,
        _image: &DynamicImage,
        _orientation: Orientation,
        _options: &RecognitionOptions,
    ) -> Result<Vec<TextRegion>, EngineError> {
        Ok(Vec::new())
    }
}
