//! Windows OCR API backend
//!
//! Uses the built-in Windows OCR (Media.Ocr). The API has no orientation
//! hint, quality tier, language correction switch or custom vocabulary, so
//! the image is uprighted here and those options are ignored. Results are
//! reported one region per line with a single candidate.

use std::collections::HashMap;

use image::imageops::FilterType;
use image::DynamicImage;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use windows::{
    core::HSTRING,
    Foundation::IAsyncOperation,
    Globalization::Language,
    Graphics::Imaging::{BitmapPixelFormat, SoftwareBitmap},
    Media::Ocr::{OcrEngine as WinOcrEngine, OcrResult as WinOcrResult},
    Storage::Streams::{DataReader, DataWriter, InMemoryRandomAccessStream},
};

use super::engine::{LanguageSelection, RecognitionOptions, TextRecognitionEngine};
use super::error::EngineError;
use super::region::{NormalizedRect, TextRegion};
use super::task::Orientation;

const BACKEND: &str = "windows";

/// Cache key for the engine created from the user profile languages
const PROFILE_KEY: &str = "";

/// Windows OCR doesn't report confidence
const LINE_CONFIDENCE: f32 = 1.0;

/// Attach a description to a WinRT failure
trait WinContext<T> {
    fn context(self, what: &str) -> Result<T, EngineError>;
}

impl<T> WinContext<T> for windows::core::Result<T> {
    fn context(self, what: &str) -> Result<T, EngineError> {
        self.map_err(|err| EngineError::backend(format!("{what}: {err}")))
    }
}

/// Windows OCR engine, one native engine per recognizer language
pub struct WindowsOcrEngine {
    engines: Mutex<HashMap<String, WinOcrEngine>>,
}

impl WindowsOcrEngine {
    /// Check that OCR is usable on this system
    pub fn new() -> Result<Self, EngineError> {
        let languages = Self::available_languages()?;
        if languages.is_empty() {
            return Err(EngineError::unavailable(
                BACKEND,
                "no OCR recognizer languages are installed",
            ));
        }
        info!("Windows OCR available for: {}", languages.join(", "));

        Ok(Self {
            engines: Mutex::new(HashMap::new()),
        })
    }

    /// Recognizer languages installed on this system
    pub fn available_languages() -> Result<Vec<String>, EngineError> {
        let languages = WinOcrEngine::AvailableRecognizerLanguages()
            .context("Failed to get available languages")?;

        let mut result = Vec::new();
        for i in 0..languages.Size().context("Failed to get languages size")? {
            if let Ok(lang) = languages.GetAt(i) {
                if let Ok(tag) = lang.LanguageTag() {
                    result.push(tag.to_string());
                }
            }
        }

        Ok(result)
    }

    /// Native engine for the first supported language, created on first use
    fn engine_for(&self, languages: &LanguageSelection) -> Result<WinOcrEngine, EngineError> {
        let tags: &[String] = match languages {
            LanguageSelection::Automatic => &[],
            LanguageSelection::Fixed(tags) => tags,
        };

        for tag in tags {
            if let Some(engine) = self.engines.lock().get(tag) {
                return Ok(engine.clone());
            }

            let language = Language::CreateLanguage(&HSTRING::from(tag.as_str()))
                .context("Failed to create language")?;
            if !WinOcrEngine::IsLanguageSupported(&language)
                .context("Failed to check language support")?
            {
                debug!("Windows OCR: language '{}' not supported", tag);
                continue;
            }

            let engine = WinOcrEngine::TryCreateFromLanguage(&language)
                .context("Failed to create OCR engine for language")?;
            info!("Windows OCR engine created for {}", tag);
            self.engines.lock().insert(tag.clone(), engine.clone());
            return Ok(engine);
        }

        if !tags.is_empty() {
            warn!(
                "None of [{}] supported by Windows OCR, falling back to profile languages",
                tags.join(", ")
            );
        }

        if let Some(engine) = self.engines.lock().get(PROFILE_KEY) {
            return Ok(engine.clone());
        }
        let engine = WinOcrEngine::TryCreateFromUserProfileLanguages()
            .context("Failed to create OCR engine from user profile")?;
        if let Ok(tag) = engine.RecognizerLanguage().and_then(|l| l.LanguageTag()) {
            info!("Windows OCR engine created for profile language {}", tag);
        }
        self.engines
            .lock()
            .insert(PROFILE_KEY.to_string(), engine.clone());
        Ok(engine)
    }
}

impl TextRecognitionEngine for WindowsOcrEngine {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn warm_up(&self) -> Result<(), EngineError> {
        self.engine_for(&LanguageSelection::Automatic).map(|_| ())
    }

    fn detect_text(
        &self,
        image: &DynamicImage,
        orientation: Orientation,
        options: &RecognitionOptions,
    ) -> Result<Vec<TextRegion>, EngineError> {
        let engine = self.engine_for(&options.languages)?;
        let upright = orientation.apply(image.clone());
        let (full_width, full_height) = (upright.width(), upright.height());

        let (crop_x, crop_y, crop) = match options.region_of_interest {
            Some(roi) => {
                let (x, y, w, h) = roi.to_top_left_pixels(full_width, full_height);
                (x, y, upright.crop_imm(x, y, w, h))
            }
            None => (0, 0, upright),
        };

        // Windows OCR rejects images above its maximum dimension
        let max_dimension = WinOcrEngine::MaxImageDimension()
            .context("Failed to get maximum image dimension")?;
        let (crop_width, crop_height) = (crop.width(), crop.height());
        let (input, scale) = if crop_width.max(crop_height) > max_dimension {
            let resized = crop.resize(max_dimension, max_dimension, FilterType::Lanczos3);
            let scale = f64::from(crop_width) / f64::from(resized.width().max(1));
            (resized, scale)
        } else {
            (crop, 1.0)
        };

        debug!(
            "Windows OCR: Processing {}x{} image",
            input.width(),
            input.height()
        );

        let bgra = rgba_to_bgra(input.to_rgba8().into_raw());
        let bitmap = create_software_bitmap(&bgra, input.width(), input.height())?;
        let ocr_result = run_ocr_sync(&engine, &bitmap)?;

        let mut regions = Vec::new();
        for (text, (x, y, w, h)) in extract_lines(&ocr_result)? {
            let bounds = NormalizedRect::from_top_left_pixels(
                f64::from(crop_x) + x * scale,
                f64::from(crop_y) + y * scale,
                w * scale,
                h * scale,
                full_width,
                full_height,
            );
            if let Some(min_height) = options.minimum_text_height {
                if bounds.height() < f64::from(min_height) {
                    continue;
                }
            }
            regions.push(TextRegion::single(bounds, text, LINE_CONFIDENCE));
        }

        debug!("Windows OCR: Found {} lines", regions.len());
        Ok(regions)
    }
}

/// Convert RGBA to BGRA (Windows expects BGRA)
fn rgba_to_bgra(mut pixels: Vec<u8>) -> Vec<u8> {
    for chunk in pixels.chunks_exact_mut(4) {
        chunk.swap(0, 2);
    }
    pixels
}

/// Create a SoftwareBitmap from BGRA data using CopyFromBuffer
fn create_software_bitmap(
    bgra_data: &[u8],
    width: u32,
    height: u32,
) -> Result<SoftwareBitmap, EngineError> {
    let stream = InMemoryRandomAccessStream::new().context("Failed to create in-memory stream")?;
    let writer = DataWriter::CreateDataWriter(&stream).context("Failed to create data writer")?;

    writer
        .WriteBytes(bgra_data)
        .context("Failed to write pixel data")?;
    writer
        .StoreAsync()
        .context("Failed to start store operation")?
        .get()
        .context("Failed to store data")?;
    writer
        .FlushAsync()
        .context("Failed to start flush operation")?
        .get()
        .context("Failed to flush data")?;

    let bitmap = SoftwareBitmap::Create(BitmapPixelFormat::Bgra8, width as i32, height as i32)
        .context("Failed to create SoftwareBitmap")?;

    let input_stream = stream
        .GetInputStreamAt(0)
        .context("Failed to get input stream")?;
    let reader =
        DataReader::CreateDataReader(&input_stream).context("Failed to create data reader")?;
    reader
        .LoadAsync(bgra_data.len() as u32)
        .context("Failed to start load operation")?
        .get()
        .context("Failed to load data")?;
    let buffer = reader
        .ReadBuffer(bgra_data.len() as u32)
        .context("Failed to read buffer")?;

    bitmap
        .CopyFromBuffer(&buffer)
        .context("Failed to copy buffer to bitmap")?;

    Ok(bitmap)
}

/// Run OCR synchronously (blocks until complete)
fn run_ocr_sync(engine: &WinOcrEngine, bitmap: &SoftwareBitmap) -> Result<WinOcrResult, EngineError> {
    let async_op: IAsyncOperation<WinOcrResult> = engine
        .RecognizeAsync(bitmap)
        .context("Failed to start OCR recognition")?;
    async_op.get().context("OCR recognition failed")
}

/// Line text with the union of its word boxes, in top-left pixels
fn extract_lines(
    ocr_result: &WinOcrResult,
) -> Result<Vec<(String, (f64, f64, f64, f64))>, EngineError> {
    let mut lines_out = Vec::new();
    let lines = ocr_result.Lines().context("Failed to get OCR lines")?;

    for i in 0..lines.Size().context("Failed to get lines size")? {
        let line = lines.GetAt(i).context("Failed to get line")?;
        let text = line.Text().context("Failed to get line text")?.to_string();
        let words = line.Words().context("Failed to get words")?;

        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for j in 0..words.Size().context("Failed to get words size")? {
            let rect = words
                .GetAt(j)
                .context("Failed to get word")?
                .BoundingRect()
                .context("Failed to get bounding rect")?;
            let (left, top) = (f64::from(rect.X), f64::from(rect.Y));
            let (right, bottom) = (left + f64::from(rect.Width), top + f64::from(rect.Height));
            bounds = Some(match bounds {
                None => (left, top, right, bottom),
                Some((l, t, r, b)) => (l.min(left), t.min(top), r.max(right), b.max(bottom)),
            });
        }

        if let Some((left, top, right, bottom)) = bounds {
            lines_out.push((text, (left, top, right - left, bottom - top)));
        }
    }

    Ok(lines_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_rgba_to_bgra_swaps_red_and_blue() {
        assert_eq!(rgba_to_bgra(vec![1, 2, 3, 4, 5, 6, 7, 8]), vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_available_languages() {
        let languages = WindowsOcrEngine::available_languages().unwrap();
        println!("Available OCR languages: {:?}", languages);
        // Most Windows installations have at least English
        assert!(!languages.is_empty());
    }

    #[test]
    fn test_blank_image_has_no_text() {
        let engine = WindowsOcrEngine::new().unwrap();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            200,
            100,
            image::Rgba([255, 255, 255, 255]),
        ));
        let regions = engine
            .detect_text(&image, Orientation::Up, &RecognitionOptions::default())
            .unwrap();
        assert!(regions.is_empty());
    }
}
