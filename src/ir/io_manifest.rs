//! JSON batch manifest: the per-image results of a detection or caption run.
//!
//! The manifest is how results survive between `moonlabel detect` and
//! `moonlabel export`. It records image paths, not image bytes; images are
//! re-read from disk when the manifest is loaded into a [`Batch`].
//!
//! ```json
//! { "kind": "detections",
//!   "images": [ { "file": "imgs/a.jpg",
//!                 "detections": [ { "label": "cat", "x_center": 0.5, "y_center": 0.5,
//!                                   "width": 0.2, "height": 0.3 } ] } ] }
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::model::{Batch, CaptionResult, Detection, ImageFile, ImageResult};
use crate::error::MoonlabelError;

/// A stored batch of results, tagged by result kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Manifest {
    Detections { images: Vec<DetectionEntry> },
    Captions { images: Vec<CaptionEntry> },
}

/// Detections for one image file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionEntry {
    /// Image path, absolute or relative to the manifest's directory.
    pub file: String,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Caption for one image file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    /// Image path, absolute or relative to the manifest's directory.
    pub file: String,
    #[serde(default)]
    pub caption: String,
}

impl Manifest {
    /// Number of image entries.
    pub fn len(&self) -> usize {
        match self {
            Manifest::Detections { images } => images.len(),
            Manifest::Captions { images } => images.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads every referenced image and assembles the in-memory batch.
    ///
    /// Relative `file` paths are resolved against `base_dir`. The image's
    /// file name in the batch is the last component of its path.
    pub fn load_batch(&self, base_dir: &Path) -> Result<Batch, MoonlabelError> {
        match self {
            Manifest::Detections { images } => {
                let mut results = Vec::with_capacity(images.len());
                for entry in images {
                    let image = load_image(base_dir, &entry.file)?;
                    results.push(ImageResult::new(image, entry.detections.clone()));
                }
                Ok(Batch::Detections(results))
            }
            Manifest::Captions { images } => {
                let mut results = Vec::with_capacity(images.len());
                for entry in images {
                    let image = load_image(base_dir, &entry.file)?;
                    results.push(CaptionResult::new(image, entry.caption.clone()));
                }
                Ok(Batch::Captions(results))
            }
        }
    }
}

/// Reads a manifest from a JSON file.
pub fn read_manifest(path: &Path) -> Result<Manifest, MoonlabelError> {
    let file = File::open(path).map_err(MoonlabelError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| MoonlabelError::ManifestParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a manifest file and loads its images, resolving paths against the
/// manifest's own directory.
pub fn read_batch(path: &Path) -> Result<Batch, MoonlabelError> {
    let manifest = read_manifest(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    manifest.load_batch(base_dir)
}

/// Writes a manifest as pretty-printed JSON.
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<(), MoonlabelError> {
    let file = File::create(path).map_err(MoonlabelError::Io)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, manifest).map_err(|source| {
        MoonlabelError::ManifestWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Parses a manifest from a JSON string.
pub fn from_manifest_str(json: &str) -> Result<Manifest, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parses a manifest from raw bytes.
pub fn from_manifest_slice(bytes: &[u8]) -> Result<Manifest, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Serializes a manifest to a pretty-printed JSON string.
pub fn to_manifest_string(manifest: &Manifest) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(manifest)
}

fn load_image(base_dir: &Path, file: &str) -> Result<ImageFile, MoonlabelError> {
    let path: PathBuf = base_dir.join(file);
    let data = fs::read(&path).map_err(|source| MoonlabelError::ManifestImageRead {
        path: path.clone(),
        source,
    })?;

    let file_name = Path::new(file)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());

    Ok(ImageFile::new(file_name, data))
}
