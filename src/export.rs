//! Export orchestration: a validated request in, archive bytes out.
//!
//! One call to [`export`] owns everything it builds: the label registry,
//! the resolved file names and the archive buffer. Nothing is cached
//! between calls, so exporting the same batch twice gives the same bytes.

use std::borrow::Cow;
use std::fmt;

use tracing::{debug, info};

use crate::archive::layout::{resolve_file_names, CollisionPolicy, ARCHIVE_FILE_NAME};
use crate::archive::build_archive;
use crate::backend::VisionBackend;
use crate::encode::{self, ArchiveItems};
use crate::error::MoonlabelError;
use crate::ir::{Batch, CaptionLength, ExportFormat, ImageFile, LabelIndex};
use crate::request::RequestOrchestrator;

/// Where caption text comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptionSource {
    /// Use the captions already in the batch.
    #[default]
    Reuse,
    /// Ask the backend for fresh captions of every image at export time.
    Regenerate(CaptionLength),
}

/// Knobs of one export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub caption_source: CaptionSource,
    pub collisions: CollisionPolicy,
}

/// A format and a batch that have been checked to belong together.
#[derive(Clone, Debug)]
pub struct ExportRequest {
    format: ExportFormat,
    batch: Batch,
    options: ExportOptions,
}

impl ExportRequest {
    /// Validates the combination of format, batch and options.
    ///
    /// # Errors
    ///
    /// - [`MoonlabelError::EmptyBatch`] for a batch without images;
    /// - [`MoonlabelError::FormatMismatch`] when a detection format gets a
    ///   caption batch, or the caption format gets detections without
    ///   [`CaptionSource::Regenerate`].
    pub fn new(
        format: ExportFormat,
        batch: Batch,
        options: ExportOptions,
    ) -> Result<Self, MoonlabelError> {
        if batch.is_empty() {
            return Err(MoonlabelError::EmptyBatch);
        }

        let compatible = match (&batch, format) {
            (Batch::Detections(_), ExportFormat::Yolo | ExportFormat::Voc | ExportFormat::Coco) => {
                true
            }
            (Batch::Captions(_), ExportFormat::Caption) => true,
            (Batch::Detections(_), ExportFormat::Caption) => {
                matches!(options.caption_source, CaptionSource::Regenerate(_))
            }
            (Batch::Captions(_), _) => false,
        };

        if !compatible {
            return Err(MoonlabelError::FormatMismatch {
                format: format.name(),
                batch: batch.kind_name(),
            });
        }

        Ok(Self {
            format,
            batch,
            options,
        })
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Whether running this request calls the caption backend.
    pub fn needs_backend(&self) -> bool {
        self.format == ExportFormat::Caption
            && matches!(self.options.caption_source, CaptionSource::Regenerate(_))
    }
}

/// What went into an archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    pub format: ExportFormat,
    /// Images stored in the archive.
    pub images: usize,
    /// Boxes written (zero for captions).
    pub objects: usize,
    /// Distinct labels in the batch.
    pub labels: usize,
    /// Zip entries, directories included.
    pub entries: usize,
    /// Suggested file name for saving the archive.
    pub file_name: &'static str,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Exported {} image(s) as {} ({} object(s), {} label(s), {} archive entries)",
            self.images, self.format, self.objects, self.labels, self.entries
        )
    }
}

/// A finished export.
#[derive(Clone, Debug)]
pub struct ExportOutput {
    pub archive: Vec<u8>,
    pub summary: ExportSummary,
}

/// Runs an export.
///
/// `backend` is only consulted when the request regenerates captions; in
/// that case its absence is [`MoonlabelError::MissingCaptionBackend`]. Any
/// error aborts the whole export and no archive is returned.
pub fn export(
    request: &ExportRequest,
    backend: Option<&mut dyn VisionBackend>,
) -> Result<ExportOutput, MoonlabelError> {
    let format = request.format;
    let batch = prepare_batch(request, backend)?;

    let names = resolve_file_names(
        batch.images().into_iter().map(|image| image.file_name.as_str()),
        request.options.collisions,
    )?;

    // The registry spans the whole batch, including images a collision
    // policy leaves out of the archive.
    let labels = match batch.as_ref() {
        Batch::Detections(results) => LabelIndex::build(results),
        Batch::Captions(_) => LabelIndex::default(),
    };
    debug!(labels = ?labels.names(), "label registry built");

    let items = ArchiveItems::from_batch(&batch, &names);
    let annotations = encode::encode(format, &items, &labels)?;

    let all_images = batch.images();
    let images: Vec<(&str, &ImageFile)> = names
        .iter()
        .filter_map(|(idx, name)| all_images.get(*idx).map(|image| (name.as_str(), *image)))
        .collect();

    let built = build_archive(format, &images, &annotations)?;

    let objects = match &items {
        ArchiveItems::Detections(items) => {
            items.iter().map(|item| item.result.detections.len()).sum()
        }
        ArchiveItems::Captions(_) => 0,
    };

    let summary = ExportSummary {
        format,
        images: images.len(),
        objects,
        labels: labels.len(),
        entries: built.entry_count,
        file_name: ARCHIVE_FILE_NAME,
    };
    info!(
        format = %format,
        images = summary.images,
        objects = summary.objects,
        bytes = built.bytes.len(),
        "export finished"
    );

    Ok(ExportOutput {
        archive: built.bytes,
        summary,
    })
}

fn prepare_batch<'r>(
    request: &'r ExportRequest,
    backend: Option<&mut dyn VisionBackend>,
) -> Result<Cow<'r, Batch>, MoonlabelError> {
    let CaptionSource::Regenerate(length) = request.options.caption_source else {
        return Ok(Cow::Borrowed(&request.batch));
    };
    if request.format != ExportFormat::Caption {
        debug!(format = %request.format, "caption regeneration ignored for this format");
        return Ok(Cow::Borrowed(&request.batch));
    }

    let backend = backend.ok_or(MoonlabelError::MissingCaptionBackend)?;
    let images: Vec<ImageFile> = request.batch.images().into_iter().cloned().collect();
    info!(images = images.len(), length = length.name(), "regenerating captions");

    let captions = RequestOrchestrator::new(backend).caption_images(images, length, |progress| {
        debug!(%progress, "caption progress");
    });
    Ok(Cow::Owned(Batch::Captions(captions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CaptionResult, Detection, ImageResult};

    fn detections_batch() -> Batch {
        Batch::Detections(vec![ImageResult::new(
            ImageFile::new("a.jpg", Vec::new()),
            vec![Detection::new("cat", 0.5, 0.5, 0.2, 0.3)],
        )])
    }

    fn captions_batch() -> Batch {
        Batch::Captions(vec![CaptionResult::new(
            ImageFile::new("a.jpg", Vec::new()),
            "a cat",
        )])
    }

    #[test]
    fn empty_batch_is_rejected() {
        let err = ExportRequest::new(
            ExportFormat::Yolo,
            Batch::Detections(Vec::new()),
            ExportOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MoonlabelError::EmptyBatch));
    }

    #[test]
    fn detection_formats_need_detections() {
        for format in [ExportFormat::Yolo, ExportFormat::Voc, ExportFormat::Coco] {
            assert!(ExportRequest::new(format, detections_batch(), ExportOptions::default()).is_ok());
            let err = ExportRequest::new(format, captions_batch(), ExportOptions::default())
                .unwrap_err();
            assert!(matches!(err, MoonlabelError::FormatMismatch { .. }));
        }
    }

    #[test]
    fn caption_format_accepts_detections_only_when_regenerating() {
        let err = ExportRequest::new(
            ExportFormat::Caption,
            detections_batch(),
            ExportOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MoonlabelError::FormatMismatch {
                format: "caption",
                batch: "detections"
            }
        ));

        let options = ExportOptions {
            caption_source: CaptionSource::Regenerate(CaptionLength::Short),
            ..ExportOptions::default()
        };
        let request = ExportRequest::new(ExportFormat::Caption, detections_batch(), options)
            .expect("regenerating captions from detections");
        assert!(request.needs_backend());
    }

    #[test]
    fn regeneration_without_backend_fails() {
        let options = ExportOptions {
            caption_source: CaptionSource::Regenerate(CaptionLength::Short),
            ..ExportOptions::default()
        };
        let request =
            ExportRequest::new(ExportFormat::Caption, captions_batch(), options).expect("request");
        let err = export(&request, None).unwrap_err();
        assert!(matches!(err, MoonlabelError::MissingCaptionBackend));
    }

    #[test]
    fn caption_export_summary() {
        let request =
            ExportRequest::new(ExportFormat::Caption, captions_batch(), ExportOptions::default())
                .expect("request");
        let output = export(&request, None).expect("export captions");

        assert_eq!(output.summary.images, 1);
        assert_eq!(output.summary.objects, 0);
        assert_eq!(output.summary.entries, 4);
        assert_eq!(output.summary.file_name, "dataset.zip");
        assert!(output.summary.to_string().starts_with("Exported 1 image(s) as caption"));
    }
}
