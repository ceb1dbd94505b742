//! Per-image results that feed an export.
//!
//! A batch is an ordered list of images, each carrying either the detections
//! a backend returned for it or a caption. Order matters: it drives label
//! index assignment and every id written into the exported files.

use serde::{Deserialize, Serialize};

use super::bbox::BBoxCxCyWh;
use super::space::Normalized;
use crate::error::MoonlabelError;

/// One labeled box in normalized center/size coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Free-form label as returned by the backend (or the requested term).
    pub label: String,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl Detection {
    /// Creates a detection from a normalized center and size.
    pub fn new(
        label: impl Into<String>,
        x_center: f64,
        y_center: f64,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            label: label.into(),
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Creates a detection from normalized corners, the form vision backends
    /// usually answer with.
    pub fn from_corners(
        label: impl Into<String>,
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    ) -> Self {
        Self::new(
            label,
            (xmin + xmax) / 2.0,
            (ymin + ymax) / 2.0,
            xmax - xmin,
            ymax - ymin,
        )
    }

    /// The box part of the detection.
    #[inline]
    pub fn bbox(&self) -> BBoxCxCyWh<Normalized> {
        BBoxCxCyWh::new(self.x_center, self.y_center, self.width, self.height)
    }

    /// True for zero-area (or inverted) boxes. These are still exported.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !self.bbox().has_area()
    }
}

/// Decoded pixel size of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// An uploaded image: its original file name and raw encoded bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// Reads width and height from the encoded image header.
    ///
    /// Only the header is parsed; pixels are never decoded.
    pub fn dimensions(&self) -> Result<ImageSize, MoonlabelError> {
        let size =
            imagesize::blob_size(&self.data).map_err(|source| MoonlabelError::ImageDimensions {
                file_name: self.file_name.clone(),
                source,
            })?;

        let width: u32 = size
            .width
            .try_into()
            .map_err(|_| MoonlabelError::ImageTooLarge {
                file_name: self.file_name.clone(),
                value: size.width,
            })?;
        let height: u32 = size
            .height
            .try_into()
            .map_err(|_| MoonlabelError::ImageTooLarge {
                file_name: self.file_name.clone(),
                value: size.height,
            })?;

        Ok(ImageSize { width, height })
    }

    /// MIME type guessed from the file extension, defaulting to JPEG.
    pub fn mime_type(&self) -> &'static str {
        let ext = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "webp" => "image/webp",
            "tif" | "tiff" => "image/tiff",
            _ => "image/jpeg",
        }
    }
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("file_name", &self.file_name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Detections gathered for one image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageResult {
    pub image: ImageFile,
    pub detections: Vec<Detection>,
}

impl ImageResult {
    pub fn new(image: ImageFile, detections: Vec<Detection>) -> Self {
        Self { image, detections }
    }
}

/// Caption gathered for one image. Empty when the backend call failed.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionResult {
    pub image: ImageFile,
    pub caption: String,
}

impl CaptionResult {
    pub fn new(image: ImageFile, caption: impl Into<String>) -> Self {
        Self {
            image,
            caption: caption.into(),
        }
    }
}

/// The ordered results one export works on.
#[derive(Clone, Debug, PartialEq)]
pub enum Batch {
    Detections(Vec<ImageResult>),
    Captions(Vec<CaptionResult>),
}

impl Batch {
    pub fn len(&self) -> usize {
        match self {
            Batch::Detections(results) => results.len(),
            Batch::Captions(results) => results.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable name of the result kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Batch::Detections(_) => "detections",
            Batch::Captions(_) => "captions",
        }
    }

    /// The images of the batch in order, whatever the result kind.
    pub fn images(&self) -> Vec<&ImageFile> {
        match self {
            Batch::Detections(results) => results.iter().map(|r| &r.image).collect(),
            Batch::Captions(results) => results.iter().map(|r| &r.image).collect(),
        }
    }

    /// Total number of detections across the batch (zero for captions).
    pub fn object_count(&self) -> usize {
        match self {
            Batch::Detections(results) => results.iter().map(|r| r.detections.len()).sum(),
            Batch::Captions(_) => 0,
        }
    }
}

/// Target annotation format of an export.
///
/// This mirrors the CLI's format argument but is decoupled from clap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Yolo,
    Voc,
    Coco,
    Caption,
}

impl ExportFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Yolo => "yolo",
            ExportFormat::Voc => "voc",
            ExportFormat::Coco => "coco",
            ExportFormat::Caption => "caption",
        }
    }

    /// Whether the format is built from detections (as opposed to captions).
    pub fn reads_detections(&self) -> bool {
        !matches!(self, ExportFormat::Caption)
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Requested caption length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CaptionLength {
    #[default]
    Short,
    Medium,
    Long,
}

impl CaptionLength {
    pub fn name(&self) -> &'static str {
        match self {
            CaptionLength::Short => "short",
            CaptionLength::Medium => "medium",
            CaptionLength::Long => "long",
        }
    }

    /// Value of the `length` field sent to caption endpoints.
    pub fn api_value(&self) -> &'static str {
        match self {
            CaptionLength::Short => "short",
            CaptionLength::Medium => "normal",
            CaptionLength::Long => "long",
        }
    }
}
