#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use moonlabel::backend::VisionBackend;
use moonlabel::ir::{CaptionLength, Detection, ImageFile};
use moonlabel::BackendError;
use zip::ZipArchive;

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

pub fn bmp_image(file_name: &str, width: u32, height: u32) -> ImageFile {
    ImageFile::new(file_name, bmp_bytes(width, height))
}

/// Entry names of a zip archive, in archive order.
pub fn entry_names(archive: &[u8]) -> Vec<String> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).expect("open archive");
    (0..zip.len())
        .map(|idx| zip.by_index(idx).expect("read entry").name().to_string())
        .collect()
}

/// Raw bytes of one archive entry.
pub fn entry_bytes(archive: &[u8], name: &str) -> Vec<u8> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).expect("open archive");
    let mut entry = zip.by_name(name).expect("entry present");
    let mut out = Vec::new();
    entry.read_to_end(&mut out).expect("read entry");
    out
}

pub fn entry_text(archive: &[u8], name: &str) -> String {
    String::from_utf8(entry_bytes(archive, name)).expect("utf-8 entry")
}

/// Scripted backend: answers from fixed tables and records every call.
#[derive(Default)]
pub struct FakeBackend {
    /// Detections per (file name, label). Missing pairs answer with no boxes.
    pub detections: HashMap<(String, String), Vec<Detection>>,
    /// Captions per file name. Missing files answer with a generic caption.
    pub captions: HashMap<String, String>,
    /// (file name, label) pairs that fail with a status error.
    pub failing: Vec<(String, String)>,
    /// File names whose caption call fails.
    pub failing_captions: Vec<String>,
    pub detect_calls: Vec<(String, String)>,
    pub caption_calls: Vec<(String, CaptionLength)>,
}

impl FakeBackend {
    pub fn with_detections(mut self, file: &str, label: &str, found: Vec<Detection>) -> Self {
        self.detections
            .insert((file.to_string(), label.to_string()), found);
        self
    }

    pub fn with_caption(mut self, file: &str, caption: &str) -> Self {
        self.captions.insert(file.to_string(), caption.to_string());
        self
    }

    pub fn failing_on(mut self, file: &str, label: &str) -> Self {
        self.failing.push((file.to_string(), label.to_string()));
        self
    }

    pub fn failing_caption(mut self, file: &str) -> Self {
        self.failing_captions.push(file.to_string());
        self
    }
}

impl VisionBackend for FakeBackend {
    fn detect(&mut self, image: &ImageFile, label: &str) -> Result<Vec<Detection>, BackendError> {
        let key = (image.file_name.clone(), label.to_string());
        self.detect_calls.push(key.clone());
        if self.failing.contains(&key) {
            return Err(BackendError::Status {
                url: "http://fake/detect".to_string(),
                status: 503,
            });
        }
        Ok(self.detections.get(&key).cloned().unwrap_or_default())
    }

    fn caption(
        &mut self,
        image: &ImageFile,
        length: CaptionLength,
    ) -> Result<String, BackendError> {
        self.caption_calls.push((image.file_name.clone(), length));
        if self.failing_captions.contains(&image.file_name) {
            return Err(BackendError::Transport {
                url: "http://fake/caption".to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(self
            .captions
            .get(&image.file_name)
            .cloned()
            .unwrap_or_else(|| format!("A picture named {}.", image.file_name)))
    }
}
