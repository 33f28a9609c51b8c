//! Recognition configuration shared by every worker in a batch

use serde::{Deserialize, Deserializer, Serialize};

use super::region::NormalizedRect;

/// Default longest-edge cap for input images, in pixels
pub const DEFAULT_MAX_DIMENSION: u32 = 3000;

/// Default number of images recognized at the same time
pub const DEFAULT_CONCURRENT_TASKS: usize = 2;

/// Default tolerance (fraction of image height) within which two regions
/// count as being on the same line
pub const DEFAULT_ROW_TOLERANCE: f64 = 0.01;

/// Recognition quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionLevel {
    /// Lower latency, lower accuracy
    Fast,
    /// Slower, best available accuracy
    #[default]
    Accurate,
}

/// Immutable recognition settings for a batch.
///
/// The concurrency cap and maximum dimension are clamped to at least 1
/// whenever they are set, including when loaded from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Locale tags in priority order (e.g. "en-US"); empty means auto-detect
    languages: Vec<String>,
    /// Quality tier
    recognition_level: RecognitionLevel,
    /// Apply language-model correction to candidates
    uses_language_correction: bool,
    /// Longest edge allowed for the image handed to the engine
    #[serde(deserialize_with = "deserialize_at_least_one_u32")]
    max_dimension: u32,
    /// Maximum number of concurrent recognitions
    #[serde(deserialize_with = "deserialize_at_least_one_usize")]
    concurrent_tasks: usize,
    /// Ignore text shorter than this fraction of the image height
    minimum_text_height: Option<f32>,
    /// Domain vocabulary hints
    custom_words: Vec<String>,
    /// Same-line tolerance used when ordering regions
    #[serde(deserialize_with = "deserialize_tolerance")]
    row_tolerance: f64,
    /// Only recognize inside this normalized rectangle
    region_of_interest: Option<NormalizedRect>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            recognition_level: RecognitionLevel::Accurate,
            uses_language_correction: true,
            max_dimension: DEFAULT_MAX_DIMENSION,
            concurrent_tasks: DEFAULT_CONCURRENT_TASKS,
            minimum_text_height: None,
            custom_words: Vec::new(),
            row_tolerance: DEFAULT_ROW_TOLERANCE,
            region_of_interest: None,
        }
    }
}

impl RecognitionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages
            .into_iter()
            .map(Into::into)
            .map(|tag: String| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        self
    }

    pub fn with_recognition_level(mut self, level: RecognitionLevel) -> Self {
        self.recognition_level = level;
        self
    }

    pub fn with_language_correction(mut self, enabled: bool) -> Self {
        self.uses_language_correction = enabled;
        self
    }

    pub fn with_max_dimension(mut self, pixels: u32) -> Self {
        self.max_dimension = pixels.max(1);
        self
    }

    pub fn with_concurrent_tasks(mut self, tasks: usize) -> Self {
        self.concurrent_tasks = tasks.max(1);
        self
    }

    pub fn with_minimum_text_height(mut self, fraction: Option<f32>) -> Self {
        self.minimum_text_height = fraction.map(|f| f.clamp(0.0, 1.0));
        self
    }

    pub fn with_region_of_interest(mut self, roi: Option<NormalizedRect>) -> Self {
        self.region_of_interest = roi;
        self
    }

    pub fn with_custom_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_row_tolerance(mut self, tolerance: f64) -> Self {
        self.row_tolerance = sanitize_tolerance(tolerance);
        self
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn recognition_level(&self) -> RecognitionLevel {
        self.recognition_level
    }

    pub fn uses_language_correction(&self) -> bool {
        self.uses_language_correction
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn concurrent_tasks(&self) -> usize {
        self.concurrent_tasks
    }

    pub fn minimum_text_height(&self) -> Option<f32> {
        self.minimum_text_height
    }

    pub fn region_of_interest(&self) -> Option<NormalizedRect> {
        self.region_of_interest
    }

    pub fn custom_words(&self) -> &[String] {
        &self.custom_words
    }

    pub fn row_tolerance(&self) -> f64 {
        self.row_tolerance
    }
}

fn sanitize_tolerance(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        DEFAULT_ROW_TOLERANCE
    }
}

fn deserialize_at_least_one_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(u32::deserialize(deserializer)?.max(1))
}

fn deserialize_at_least_one_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(usize::deserialize(deserializer)?.max(1))
}

fn deserialize_tolerance<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(sanitize_tolerance(f64::deserialize(deserializer)?))
}
