//! Ultralytics-style YOLO writer.
//!
//! One label file per image under `labels/`, one line per detection:
//!
//! ```text
//! <class index> <x_center> <y_center> <width> <height>
//! ```
//!
//! Coordinates are the normalized values the backend produced, printed with
//! Rust's shortest round-trip float formatting. The class list goes into a
//! `data.yaml` at the archive root whose `train`/`val`/`test` entries all
//! point at the single `images` folder.

use super::{base_name, AnnotationFile, ArchiveItem};
use crate::archive::layout::{DATA_YAML, LABELS_DIR};
use crate::error::MoonlabelError;
use crate::ir::{Detection, ImageResult, LabelIndex};

const LABEL_EXTENSION: &str = "txt";

/// Encodes one label file per image plus `data.yaml`.
///
/// Images without detections still get an (empty) label file.
pub fn encode(
    items: &[ArchiveItem<'_, ImageResult>],
    labels: &LabelIndex,
) -> Result<Vec<AnnotationFile>, MoonlabelError> {
    let mut files = Vec::with_capacity(items.len() + 1);

    for item in items {
        let path = format!(
            "{LABELS_DIR}/{}.{LABEL_EXTENSION}",
            base_name(item.file_name)
        );
        let contents = label_file_contents(&item.result.detections, labels)?;
        files.push(AnnotationFile::new(path, contents));
    }

    files.push(AnnotationFile::new(DATA_YAML, data_yaml(labels)));
    Ok(files)
}

/// Formats one detection as a YOLO line, without the trailing newline.
///
/// ```
/// use moonlabel::encode::yolo::yolo_line;
/// use moonlabel::ir::Detection;
///
/// let det = Detection::new("cat", 0.5, 0.5, 0.2, 0.3);
/// assert_eq!(yolo_line(&det, 0), "0 0.5 0.5 0.2 0.3");
/// ```
pub fn yolo_line(detection: &Detection, class_index: usize) -> String {
    format!(
        "{} {} {} {} {}",
        class_index, detection.x_center, detection.y_center, detection.width, detection.height
    )
}

/// Contents of one label file: each detection's line, newline-terminated.
pub fn label_file_contents(
    detections: &[Detection],
    labels: &LabelIndex,
) -> Result<String, MoonlabelError> {
    let mut out = String::new();
    for detection in detections {
        let class_index = class_index(labels, &detection.label)?;
        out.push_str(&yolo_line(detection, class_index));
        out.push('\n');
    }
    Ok(out)
}

/// Every YOLO line of the batch, in batch order, as one block of text.
///
/// This is what the `lines` command prints for pasting elsewhere.
pub fn flat_lines(results: &[ImageResult], labels: &LabelIndex) -> Result<String, MoonlabelError> {
    let mut out = String::new();
    for result in results {
        out.push_str(&label_file_contents(&result.detections, labels)?);
    }
    Ok(out)
}

/// Renders the `data.yaml` manifest for the given label order.
pub fn data_yaml(labels: &LabelIndex) -> String {
    let mut yaml = String::from("path: .\ntrain: images\nval: images\ntest: images\n\n");

    if labels.is_empty() {
        // An empty mapping keeps `names` a mapping for YAML readers.
        yaml.push_str("names: {}\n");
        return yaml;
    }

    yaml.push_str("names:\n");
    for (idx, name) in labels.iter() {
        yaml.push_str(&format!("  {}: {}\n", idx, yaml_scalar(name)));
    }
    yaml
}

fn class_index(labels: &LabelIndex, label: &str) -> Result<usize, MoonlabelError> {
    labels
        .index_of(label)
        .ok_or_else(|| MoonlabelError::LabelNotRegistered {
            label: label.to_string(),
        })
}

/// Single-quoted unless the label holds control characters, which YAML would
/// fold or strip inside single quotes.
fn yaml_scalar(raw: &str) -> String {
    if !raw.chars().any(char::is_control) {
        return format!("'{}'", raw.replace('\'', "''"));
    }

    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
