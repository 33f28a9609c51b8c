//! Single-image recognition pipeline
//!
//! prepare → detect → order → pick top candidates → normalize

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use super::config::RecognitionConfig;
use super::engine::{RecognitionOptions, TextRecognitionEngine};
use super::error::RecognitionError;
use super::normalize::normalize_lines;
use super::preprocess::prepare_image;
use super::reading_order::order_regions;
use super::task::{ImageTask, TaskId};

/// Text extracted from one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionResult {
    pub id: TaskId,
    /// Normalized text, one reading-order line per `\n`
    pub text: String,
    /// Top candidate of each region in reading order, before normalization
    pub lines: Vec<String>,
}

impl RecognitionResult {
    /// Whether no text was found
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Runs the full pipeline for one image against a shared engine
#[derive(Clone)]
pub struct Recognizer {
    engine: Arc<dyn TextRecognitionEngine>,
}

impl Recognizer {
    pub fn new(engine: Arc<dyn TextRecognitionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn TextRecognitionEngine> {
        &self.engine
    }

    /// Recognize one task. Blocks the calling thread for the engine call.
    pub fn recognize(
        &self,
        task: ImageTask,
        config: &RecognitionConfig,
    ) -> Result<RecognitionResult, RecognitionError> {
        let start = Instant::now();
        let ImageTask {
            id,
            image,
            orientation,
        } = task;

        let prepared = prepare_image(image, orientation, config.max_dimension())?;
        let options = RecognitionOptions::from_config(config);
        let regions =
            self.engine
                .detect_text(&prepared.image, prepared.orientation, &options)?;
        let region_count = regions.len();

        let lines: Vec<String> = order_regions(regions, config.row_tolerance())
            .into_iter()
            .filter_map(|region| region.top_candidate().map(|c| c.text.clone()))
            .collect();
        let text = normalize_lines(&lines);

        debug!(
            "Recognized {} with {} in {:?}: {} regions, {} lines",
            id,
            self.engine.name(),
            start.elapsed(),
            region_count,
            lines.len()
        );

        Ok(RecognitionResult { id, text, lines })
    }
}
