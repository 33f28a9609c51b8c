//! Vision/OCR Layer
//!
//! Extracts text from batches of page images. Each image is bounded in
//! size, handed to a recognition engine, and the detected regions are put
//! into reading order and cleaned up. Supported backends:
//! - Windows OCR API (Windows only)
//! - No-op engine (always finds nothing)

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod preprocess;
pub mod reading_order;
pub mod recognizer;
pub mod region;
pub mod task;
#[cfg(windows)]
pub mod windows_ocr;

pub use batch::{BatchOutcome, BatchRecognizer, ProgressEvent};
pub use config::{
    RecognitionConfig, RecognitionLevel, DEFAULT_CONCURRENT_TASKS, DEFAULT_MAX_DIMENSION,
    DEFAULT_ROW_TOLERANCE,
};
pub use engine::{LanguageSelection, NoopEngine, RecognitionOptions, TextRecognitionEngine};
pub use error::{EngineError, ImagePreparationError, RecognitionError};
pub use normalize::{normalize_line, normalize_lines};
pub use preprocess::{prepare_image, PreparedImage};
pub use reading_order::order_regions;
pub use recognizer::{RecognitionResult, Recognizer};
pub use region::{NormalizedRect, TextCandidate, TextRegion};
pub use task::{ImageData, ImageTask, Orientation, TaskId};
#[cfg(windows)]
pub use windows_ocr::WindowsOcrEngine;
