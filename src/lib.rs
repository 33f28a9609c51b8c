//! flashcard-ocr - batch text extraction from photographed study pages
//!
//! Runs many images through a text recognition engine with bounded
//! concurrency and returns reading-order text per image. One image failing
//! never fails the batch.

pub mod config;
pub mod vision;

use std::sync::Arc;

use tracing::warn;

use crate::config::EngineBackend;
use crate::vision::{EngineError, NoopEngine, TextRecognitionEngine};

/// Create the engine for `backend`.
///
/// `Auto` picks the platform engine when it can be initialized and falls
/// back to [`NoopEngine`] otherwise. An explicitly requested platform
/// engine that is unavailable is an error.
pub fn create_engine(backend: EngineBackend) -> Result<Arc<dyn TextRecognitionEngine>, EngineError> {
    match backend {
        EngineBackend::Noop => Ok(Arc::new(NoopEngine)),
        EngineBackend::Windows => platform_engine(),
        EngineBackend::Auto => match platform_engine() {
            Ok(engine) => Ok(engine),
            Err(err) => {
                warn!("No platform OCR engine ({}), using noop engine", err);
                Ok(Arc::new(NoopEngine))
            }
        },
    }
}

#[cfg(windows)]
fn platform_engine() -> Result<Arc<dyn TextRecognitionEngine>, EngineError> {
    let engine = vision::WindowsOcrEngine::new()?;
    engine.warm_up()?;
    tracing::info!("Using Windows OCR engine");
    Ok(Arc::new(engine))
}

#[cfg(not(windows))]
fn platform_engine() -> Result<Arc<dyn TextRecognitionEngine>, EngineError> {
    tracing::debug!("No platform OCR engine on this OS");
    Err(EngineError::unavailable(
        "windows",
        "Windows OCR is only available on Windows",
    ))
}
