//! Archive inspection report and its text rendering.

use serde::Serialize;
use std::fmt;

use crate::ir::ExportFormat;

/// What an exported archive contains.
#[derive(Clone, Debug, Serialize)]
pub struct ArchiveReport {
    /// Format detected from the archive layout.
    pub format: ExportFormat,
    /// Zip entries, directories included.
    pub entries: usize,
    /// Files under `images/`.
    pub images: usize,
    /// Annotation files (label files, XML documents, captions or the COCO json).
    pub annotation_files: usize,
    /// Boxes across all annotation files.
    pub objects: usize,
    /// Labels in manifest order, with their box counts.
    pub labels: Vec<LabelCount>,
    /// Images with no matching annotation file.
    pub images_without_annotations: Vec<String>,
    /// Annotation files (or COCO image records) with no matching image.
    pub orphan_annotations: Vec<String>,
}

/// A label and the number of boxes carrying it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

impl ArchiveReport {
    /// Label names in manifest order.
    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|entry| entry.label.as_str()).collect()
    }

    /// True when every image has an annotation file and vice versa.
    pub fn is_consistent(&self) -> bool {
        self.images_without_annotations.is_empty() && self.orphan_annotations.is_empty()
    }
}

const BAR_WIDTH: usize = 20;

impl fmt::Display for ArchiveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Format:           {}", self.format)?;
        writeln!(f, "Entries:          {}", format_number(self.entries))?;
        writeln!(f, "Images:           {}", format_number(self.images))?;
        writeln!(
            f,
            "Annotation files: {}",
            format_number(self.annotation_files)
        )?;
        writeln!(f, "Objects:          {}", format_number(self.objects))?;

        if self.format.reads_detections() {
            writeln!(f)?;
            writeln!(f, "Labels ({}):", self.labels.len())?;
            if self.labels.is_empty() {
                writeln!(f, "  - (none)")?;
            }
            let max_count = self.labels.iter().map(|e| e.count).max().unwrap_or(0);
            for (idx, entry) in self.labels.iter().enumerate() {
                writeln!(
                    f,
                    "  {:>3}  {:<16} {:>7} {:>6}  {}",
                    idx,
                    truncate_label(&entry.label, 16),
                    format_number(entry.count),
                    fmt_percent(entry.count, self.objects),
                    render_bar(entry.count, max_count, BAR_WIDTH)
                )?;
            }
        }

        if !self.images_without_annotations.is_empty() {
            writeln!(f)?;
            writeln!(f, "Images without annotations:")?;
            for name in &self.images_without_annotations {
                writeln!(f, "  - {name}")?;
            }
        }

        if !self.orphan_annotations.is_empty() {
            writeln!(f)?;
            writeln!(f, "Annotations without images:")?;
            for name in &self.orphan_annotations {
                writeln!(f, "  - {name}")?;
            }
        }

        Ok(())
    }
}

/// Format a number with thousands separators.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

fn fmt_percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", (numerator as f64 / denominator as f64) * 100.0)
    }
}

fn render_bar(count: usize, max_count: usize, width: usize) -> String {
    if max_count == 0 || width == 0 {
        return String::new();
    }

    let filled = ((count * width) / max_count).min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() <= max_len {
        label.to_string()
    } else {
        let kept: String = label.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}
