//! In-memory zip archive builder.
//!
//! The archive is assembled entirely in a `Vec<u8>`: a failure at any entry
//! discards the buffer, so callers never see a half-written archive.
//! Entries are deflated and stamped with a fixed modification time, which
//! makes the output a pure function of its input.

pub mod layout;

use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::encode::AnnotationFile;
use crate::error::MoonlabelError;
use crate::ir::{ExportFormat, ImageFile};

use layout::{format_dirs, IMAGES_DIR};

/// Incremental writer for one export archive.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options,
            entries: 0,
        }
    }

    /// Adds a directory entry. `name` is given without the trailing slash.
    pub fn add_directory(&mut self, name: &str) -> Result<(), MoonlabelError> {
        let entry = format!("{name}/");
        debug!(entry = %entry, "adding archive directory");
        self.writer
            .add_directory(entry.as_str(), self.options)
            .map_err(|source| MoonlabelError::ArchiveWrite {
                entry: entry.clone(),
                source,
            })?;
        self.entries += 1;
        Ok(())
    }

    /// Adds a file entry with the given contents.
    pub fn add_file(&mut self, path: &str, contents: &[u8]) -> Result<(), MoonlabelError> {
        debug!(entry = %path, bytes = contents.len(), "adding archive file");
        self.writer
            .start_file(path, self.options)
            .map_err(|source| MoonlabelError::ArchiveWrite {
                entry: path.to_string(),
                source,
            })?;
        self.writer
            .write_all(contents)
            .map_err(|source| MoonlabelError::ArchiveWrite {
                entry: path.to_string(),
                source: source.into(),
            })?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries (directories and files) written so far.
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Writes the central directory and returns the archive bytes.
    pub fn finish(self) -> Result<Vec<u8>, MoonlabelError> {
        let cursor = self
            .writer
            .finish()
            .map_err(|source| MoonlabelError::ArchiveWrite {
                entry: "<central directory>".to_string(),
                source,
            })?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A finished archive and the number of entries it holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltArchive {
    pub bytes: Vec<u8>,
    pub entry_count: usize,
}

/// Builds the complete archive for one export.
///
/// `images` pairs each resolved archive name with its image; they are
/// stored under `images/`. `annotations` are stored at the paths the
/// encoders chose. The format's folders are written first.
pub fn build_archive(
    format: ExportFormat,
    images: &[(&str, &ImageFile)],
    annotations: &[AnnotationFile],
) -> Result<BuiltArchive, MoonlabelError> {
    let mut builder = ArchiveBuilder::new();

    for dir in format_dirs(format) {
        builder.add_directory(dir)?;
    }
    for (file_name, image) in images {
        builder.add_file(&format!("{IMAGES_DIR}/{file_name}"), &image.data)?;
    }
    for file in annotations {
        builder.add_file(&file.path, &file.contents)?;
    }

    let entry_count = builder.entry_count();
    let bytes = builder.finish()?;
    Ok(BuiltArchive { bytes, entry_count })
}
