//! Batch inputs: identifiers, orientation and image payloads

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-assigned identifier used to correlate results and progress.
///
/// Identifiers are opaque; they must be unique within one batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh random (UUID v4) identifier
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<Uuid> for TaskId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

/// How the stored pixels must be transformed to display the image upright.
///
/// Mirrors the eight EXIF orientation values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// EXIF 1
    #[default]
    Up,
    /// EXIF 2
    UpMirrored,
    /// EXIF 3
    Down,
    /// EXIF 4
    DownMirrored,
    /// EXIF 5
    LeftMirrored,
    /// EXIF 6
    Right,
    /// EXIF 7
    RightMirrored,
    /// EXIF 8
    Left,
}

impl Orientation {
    /// Produce the upright image.
    ///
    /// Engines that cannot take an orientation hint call this before
    /// recognition.
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Up => image,
            Orientation::UpMirrored => image.fliph(),
            Orientation::Down => image.rotate180(),
            Orientation::DownMirrored => image.flipv(),
            Orientation::LeftMirrored => image.rotate90().fliph(),
            Orientation::Right => image.rotate90(),
            Orientation::RightMirrored => image.rotate270().fliph(),
            Orientation::Left => image.rotate270(),
        }
    }
}

impl From<image::metadata::Orientation> for Orientation {
    fn from(value: image::metadata::Orientation) -> Self {
        use image::metadata::Orientation as Exif;
        match value {
            Exif::NoTransforms => Orientation::Up,
            Exif::FlipHorizontal => Orientation::UpMirrored,
            Exif::Rotate180 => Orientation::Down,
            Exif::FlipVertical => Orientation::DownMirrored,
            Exif::Rotate90FlipH => Orientation::LeftMirrored,
            Exif::Rotate90 => Orientation::Right,
            Exif::Rotate270FlipH => Orientation::RightMirrored,
            Exif::Rotate270 => Orientation::Left,
        }
    }
}

/// Pixels for one task: already decoded, or still encoded (JPEG, PNG, ...)
pub enum ImageData {
    Decoded(DynamicImage),
    Encoded(Vec<u8>),
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageData::Decoded(image) => f
                .debug_struct("Decoded")
                .field("width", &image.width())
                .field("height", &image.height())
                .finish(),
            ImageData::Encoded(bytes) => f
                .debug_struct("Encoded")
                .field("bytes", &bytes.len())
                .finish(),
        }
    }
}

/// One image submitted to a batch
#[derive(Debug)]
pub struct ImageTask {
    /// Correlation identifier
    pub id: TaskId,
    /// Image payload
    pub image: ImageData,
    /// Orientation of the stored pixels.
    ///
    /// For encoded payloads, `Up` defers to the EXIF orientation found
    /// while decoding.
    pub orientation: Orientation,
}

impl ImageTask {
    /// Task over a decoded image
    pub fn new(id: impl Into<TaskId>, image: DynamicImage, orientation: Orientation) -> Self {
        Self {
            id: id.into(),
            image: ImageData::Decoded(image),
            orientation,
        }
    }

    /// Task over encoded image bytes, decoded by the worker that runs it
    pub fn from_encoded(id: impl Into<TaskId>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            image: ImageData::Encoded(bytes),
            orientation: Orientation::Up,
        }
    }
}
