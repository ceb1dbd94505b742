//! Format encoders: per-image results in, annotation files out.
//!
//! Every encoder is a pure function from resolved archive items (plus the
//! batch-wide [`LabelIndex`] where labels are involved) to a list of
//! [`AnnotationFile`]s. Nothing here touches the filesystem or the zip
//! writer; the archive builder places the returned files.
//!
//! # Supported formats
//!
//! | Format    | Files                                   |
//! |-----------|-----------------------------------------|
//! | `yolo`    | `labels/<base>.txt` per image, `data.yaml` |
//! | `voc`     | `annotations/<base>.xml` per image       |
//! | `coco`    | `annotations.json`                       |
//! | `caption` | `captions/<base>.txt` per image          |

pub mod caption;
pub mod coco;
pub mod voc;
pub mod yolo;

use crate::error::MoonlabelError;
use crate::ir::{Batch, ExportFormat, LabelIndex};

/// One encoded annotation file and its path inside the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationFile {
    pub path: String,
    pub contents: Vec<u8>,
}

impl AnnotationFile {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// File contents as text. Every encoder writes UTF-8.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }
}

/// A batch result paired with the file name it gets inside the archive.
///
/// Archive names are resolved up front so that colliding upload names never
/// produce colliding annotation paths.
#[derive(Clone, Copy, Debug)]
pub struct ArchiveItem<'a, T> {
    pub file_name: &'a str,
    pub result: &'a T,
}

impl<'a, T> ArchiveItem<'a, T> {
    pub fn new(file_name: &'a str, result: &'a T) -> Self {
        Self { file_name, result }
    }
}

/// Batch results with their archive names, by result kind.
#[derive(Clone, Debug)]
pub enum ArchiveItems<'a> {
    Detections(Vec<ArchiveItem<'a, crate::ir::ImageResult>>),
    Captions(Vec<ArchiveItem<'a, crate::ir::CaptionResult>>),
}

/// Encodes `items` in the requested format.
///
/// `labels` must have been built over the whole batch; it is ignored for
/// captions. A detection format given caption items (or the reverse) is a
/// [`MoonlabelError::FormatMismatch`].
pub fn encode(
    format: ExportFormat,
    items: &ArchiveItems<'_>,
    labels: &LabelIndex,
) -> Result<Vec<AnnotationFile>, MoonlabelError> {
    match (format, items) {
        (ExportFormat::Yolo, ArchiveItems::Detections(items)) => yolo::encode(items, labels),
        (ExportFormat::Voc, ArchiveItems::Detections(items)) => voc::encode(items),
        (ExportFormat::Coco, ArchiveItems::Detections(items)) => {
            Ok(vec![coco::encode(items, labels)?])
        }
        (ExportFormat::Caption, ArchiveItems::Captions(items)) => Ok(caption::encode(items)),
        (format, items) => Err(MoonlabelError::FormatMismatch {
            format: format.name(),
            batch: items.kind_name(),
        }),
    }
}

impl ArchiveItems<'_> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ArchiveItems::Detections(_) => "detections",
            ArchiveItems::Captions(_) => "captions",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArchiveItems::Detections(items) => items.len(),
            ArchiveItems::Captions(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> ArchiveItems<'a> {
    /// Pairs every result of `batch` with its name from `names`.
    ///
    /// `names` holds `(batch index, archive name)` pairs as produced by
    /// [`crate::archive::layout::resolve_file_names`]; batch entries without
    /// a name are left out.
    pub fn from_batch(batch: &'a Batch, names: &'a [(usize, String)]) -> Self {
        match batch {
            Batch::Detections(results) => ArchiveItems::Detections(
                names
                    .iter()
                    .filter_map(|(idx, name)| {
                        results.get(*idx).map(|result| ArchiveItem::new(name, result))
                    })
                    .collect(),
            ),
            Batch::Captions(results) => ArchiveItems::Captions(
                names
                    .iter()
                    .filter_map(|(idx, name)| {
                        results.get(*idx).map(|result| ArchiveItem::new(name, result))
                    })
                    .collect(),
            ),
        }
    }
}

/// Archive file name with its last extension removed.
///
/// A leading dot does not start an extension (`.hidden` stays `.hidden`)
/// and neither does a trailing one (`photo.` stays `photo.`).
pub fn base_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < file_name.len() => &file_name[..dot],
        _ => file_name,
    }
}
