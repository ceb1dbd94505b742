//! Plain-text caption writer: `captions/<base>.txt` per image.

use super::{base_name, AnnotationFile, ArchiveItem};
use crate::archive::layout::CAPTIONS_DIR;
use crate::ir::CaptionResult;

/// Writes each caption verbatim, without a trailing newline.
///
/// An empty caption still produces an (empty) file so every image keeps
/// exactly one annotation file.
pub fn encode(items: &[ArchiveItem<'_, CaptionResult>]) -> Vec<AnnotationFile> {
    items
        .iter()
        .map(|item| {
            AnnotationFile::new(
                format!("{CAPTIONS_DIR}/{}.txt", base_name(item.file_name)),
                item.result.caption.as_bytes(),
            )
        })
        .collect()
}
