use thiserror::Error;

/// The image could not be turned into a raster the engine can process
#[derive(Debug, Error)]
pub enum ImagePreparationError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to read image data: {0}")]
    Io(#[from] std::io::Error),
    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// The recognition engine failed for one image
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("recognition backend `{backend}` is not available: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl EngineError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            backend,
            reason: reason.into(),
        }
    }
}

/// Why a single image produced no result
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error(transparent)]
    Preparation(#[from] ImagePreparationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("recognition worker stopped unexpectedly: {0}")]
    Worker(String),
}
