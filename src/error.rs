use std::path::PathBuf;
use thiserror::Error;

/// The main error type for moonlabel operations.
#[derive(Debug, Error)]
pub enum MoonlabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export batch is empty; at least one image is required")]
    EmptyBatch,

    #[error("Format '{format}' cannot be exported from a batch of {batch}")]
    FormatMismatch {
        format: &'static str,
        batch: &'static str,
    },

    #[error("Failed to read pixel dimensions of image '{file_name}': {source}")]
    ImageDimensions {
        file_name: String,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Image '{file_name}' dimension {value} does not fit in u32")]
    ImageTooLarge { file_name: String, value: usize },

    #[error("Label '{label}' is not present in the label index")]
    LabelNotRegistered { label: String },

    #[error("Duplicate image file name '{file_name}' in export batch")]
    DuplicateFileName { file_name: String },

    #[error("Caption regeneration was requested but no caption backend was provided")]
    MissingCaptionBackend,

    #[error("Failed to parse batch manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write batch manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read image {path} referenced by manifest: {source}")]
    ManifestImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize COCO annotations: {0}")]
    CocoJsonWrite(#[source] serde_json::Error),

    #[error("Failed to write archive entry '{entry}': {source}")]
    ArchiveWrite {
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to read archive: {0}")]
    ArchiveRead(#[source] zip::result::ZipError),

    #[error("Invalid archive layout: {message}")]
    ArchiveInvalid { message: String },

    #[error("Failed to parse data.yaml in archive: {0}")]
    DataYamlParse(#[source] serde_yaml::Error),

    #[error("Failed to parse annotations.json in archive: {0}")]
    CocoJsonParse(#[source] serde_json::Error),

    #[error("Failed to parse VOC XML '{entry}': {message}")]
    VocXmlParse { entry: String, message: String },

    #[error("Invalid backend configuration: {0}")]
    InvalidBackendConfig(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend request failed: {0}")]
    Backend(#[from] BackendError),

    #[error("No label terms given; pass a comma-separated list such as 'person, car'")]
    NoLabelTerms,

    #[error("No images found in the given inputs")]
    NoImages,

    #[error("Failed to serialize report: {0}")]
    ReportJsonWrite(#[source] serde_json::Error),

    #[error("Detection failed for all {total} image(s)")]
    DetectionFailed { total: usize },
}

/// Errors from a single vision backend call.
///
/// These are isolated per image by the request orchestrator and only become
/// fatal when a caller chooses to propagate them.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("{0}")]
    Rejected(String),
}
