//! Read-back inspection of exported archives.
//!
//! The format is recognised from the layout alone:
//!
//! - `data.yaml` at the root: YOLO;
//! - `annotations.json` at the root: COCO;
//! - an `annotations/` folder: VOC;
//! - a `captions/` folder: caption.
//!
//! Labels are reported in manifest order: the `data.yaml` names, the COCO
//! categories, or first appearance across the VOC documents.

mod report;

pub use report::{ArchiveReport, LabelCount};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read};

use serde::Deserialize;
use zip::ZipArchive;

use crate::archive::layout::{
    ANNOTATIONS_DIR, CAPTIONS_DIR, COCO_JSON, DATA_YAML, IMAGES_DIR, LABELS_DIR,
};
use crate::encode::base_name;
use crate::encode::coco::CocoDataset;
use crate::error::MoonlabelError;
use crate::ir::ExportFormat;

/// Inspects an in-memory archive.
pub fn inspect_archive(bytes: &[u8]) -> Result<ArchiveReport, MoonlabelError> {
    let contents = ArchiveContents::read(bytes)?;
    let format = contents.detect_format()?;

    let images: Vec<&str> = contents.files_in(IMAGES_DIR).map(|(name, _)| name).collect();

    let tally = match format {
        ExportFormat::Yolo => tally_yolo(&contents)?,
        ExportFormat::Voc => tally_voc(&contents)?,
        ExportFormat::Coco => tally_coco(&contents)?,
        ExportFormat::Caption => tally_captions(&contents),
    };

    let (images_without_annotations, orphan_annotations) = match format {
        // COCO records full file names rather than per-image files.
        ExportFormat::Coco => {
            let recorded: HashSet<&str> = tally.annotated.iter().map(String::as_str).collect();
            let present: HashSet<&str> = images.iter().copied().collect();
            (
                images
                    .iter()
                    .filter(|name| !recorded.contains(*name))
                    .map(|name| name.to_string())
                    .collect(),
                tally
                    .annotated
                    .iter()
                    .filter(|name| !present.contains(name.as_str()))
                    .cloned()
                    .collect(),
            )
        }
        _ => {
            let annotated: HashSet<&str> = tally.annotated.iter().map(String::as_str).collect();
            let image_bases: HashSet<&str> = images.iter().map(|name| base_name(name)).collect();
            (
                images
                    .iter()
                    .filter(|name| !annotated.contains(base_name(name)))
                    .map(|name| name.to_string())
                    .collect(),
                tally
                    .annotated
                    .iter()
                    .filter(|base| !image_bases.contains(base.as_str()))
                    .cloned()
                    .collect(),
            )
        }
    };

    let objects = tally.labels.iter().map(|entry| entry.count).sum();

    Ok(ArchiveReport {
        format,
        entries: contents.entry_count,
        images: images.len(),
        annotation_files: tally.annotation_files,
        objects,
        labels: tally.labels,
        images_without_annotations,
        orphan_annotations,
    })
}

/// Parses a single YOLO label line into its class index.
///
/// Exposed for the fuzz targets only.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_line(line: &str) -> Result<(), MoonlabelError> {
    parse_label_line(line, "<memory>")?;
    Ok(())
}

// ============================================================================
// Archive reading
// ============================================================================

struct ArchiveContents {
    entry_count: usize,
    dirs: HashSet<String>,
    /// File entries in archive order. Image bytes are not kept.
    files: Vec<(String, Vec<u8>)>,
}

impl ArchiveContents {
    fn read(bytes: &[u8]) -> Result<Self, MoonlabelError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(MoonlabelError::ArchiveRead)?;

        let entry_count = archive.len();
        let mut dirs = HashSet::new();
        let mut files = Vec::new();

        for idx in 0..entry_count {
            let mut entry = archive.by_index(idx).map_err(MoonlabelError::ArchiveRead)?;
            let name = entry.name().to_string();

            if entry.is_dir() {
                dirs.insert(name.trim_end_matches('/').to_string());
                continue;
            }

            let mut data = Vec::new();
            if !name.starts_with(&format!("{IMAGES_DIR}/")) {
                entry
                    .read_to_end(&mut data)
                    .map_err(|source| MoonlabelError::ArchiveRead(source.into()))?;
            }
            files.push((name, data));
        }

        Ok(Self {
            entry_count,
            dirs,
            files,
        })
    }

    fn has_dir(&self, dir: &str) -> bool {
        self.dirs.contains(dir) || self.files_in(dir).next().is_some()
    }

    fn file(&self, path: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, data)| data.as_slice())
    }

    /// Direct children of `dir`, as `(file name, contents)`.
    fn files_in<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = (&'a str, &'a [u8])> + 'a {
        self.files.iter().filter_map(move |(name, data)| {
            let rest = name.strip_prefix(dir)?.strip_prefix('/')?;
            (!rest.is_empty() && !rest.contains('/')).then_some((rest, data.as_slice()))
        })
    }

    fn detect_format(&self) -> Result<ExportFormat, MoonlabelError> {
        if self.file(DATA_YAML).is_some() {
            Ok(ExportFormat::Yolo)
        } else if self.file(COCO_JSON).is_some() {
            Ok(ExportFormat::Coco)
        } else if self.has_dir(ANNOTATIONS_DIR) {
            Ok(ExportFormat::Voc)
        } else if self.has_dir(CAPTIONS_DIR) {
            Ok(ExportFormat::Caption)
        } else {
            Err(MoonlabelError::ArchiveInvalid {
                message: format!(
                    "no {DATA_YAML}, {COCO_JSON}, {ANNOTATIONS_DIR}/ or {CAPTIONS_DIR}/ found"
                ),
            })
        }
    }
}

/// Per-format findings.
#[derive(Default)]
struct Tally {
    annotation_files: usize,
    labels: Vec<LabelCount>,
    /// Base names (or, for COCO, file names) that have annotations.
    annotated: Vec<String>,
}

// ============================================================================
// YOLO
// ============================================================================

/// Upper bound on class indices accepted from an archive.
const MAX_CLASSES: usize = 1 << 16;

#[derive(Debug, Deserialize)]
struct DataYaml {
    #[serde(default)]
    names: Option<DataYamlNames>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

fn tally_yolo(contents: &ArchiveContents) -> Result<Tally, MoonlabelError> {
    let raw = contents.file(DATA_YAML).unwrap_or_default();
    let parsed: DataYaml = serde_yaml::from_slice(raw).map_err(MoonlabelError::DataYamlParse)?;

    let mut names: Vec<String> = match parsed.names {
        None => Vec::new(),
        Some(DataYamlNames::Sequence(names)) => names,
        Some(DataYamlNames::Mapping(mapping)) => {
            let len = mapping.keys().next_back().map_or(0, |max| max + 1);
            check_class_count(len, DATA_YAML)?;
            let mut names = vec![String::new(); len];
            for (index, name) in mapping {
                names[index] = name;
            }
            names
        }
    };

    let mut counts = vec![0usize; names.len()];
    let mut tally = Tally::default();

    for (file_name, data) in contents.files_in(LABELS_DIR) {
        tally.annotation_files += 1;
        tally.annotated.push(base_name(file_name).to_string());

        let entry = format!("{LABELS_DIR}/{file_name}");
        let text = std::str::from_utf8(data).map_err(|_| MoonlabelError::ArchiveInvalid {
            message: format!("{entry} is not valid UTF-8"),
        })?;

        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let class = parse_label_line(line, &entry)?;
            if class >= counts.len() {
                check_class_count(class + 1, &entry)?;
                counts.resize(class + 1, 0);
                names.resize_with(class + 1, String::new);
            }
            counts[class] += 1;
        }
    }

    tally.labels = names
        .into_iter()
        .zip(counts)
        .enumerate()
        .map(|(idx, (name, count))| LabelCount {
            label: if name.is_empty() {
                format!("class_{idx}")
            } else {
                name
            },
            count,
        })
        .collect();
    Ok(tally)
}

fn check_class_count(count: usize, entry: &str) -> Result<(), MoonlabelError> {
    if count > MAX_CLASSES {
        return Err(MoonlabelError::ArchiveInvalid {
            message: format!("{entry}: class index exceeds {MAX_CLASSES}"),
        });
    }
    Ok(())
}

fn parse_label_line(line: &str, entry: &str) -> Result<usize, MoonlabelError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 5 {
        return Err(MoonlabelError::ArchiveInvalid {
            message: format!(
                "{entry}: expected 5 values per line, found {}",
                tokens.len()
            ),
        });
    }

    for token in &tokens[1..] {
        token
            .parse::<f64>()
            .map_err(|_| MoonlabelError::ArchiveInvalid {
                message: format!("{entry}: '{token}' is not a number"),
            })?;
    }

    tokens[0]
        .parse::<usize>()
        .map_err(|_| MoonlabelError::ArchiveInvalid {
            message: format!("{entry}: class index '{}' is not a whole number", tokens[0]),
        })
}

// ============================================================================
// VOC
// ============================================================================

fn tally_voc(contents: &ArchiveContents) -> Result<Tally, MoonlabelError> {
    let mut tally = Tally::default();
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for (file_name, data) in contents.files_in(ANNOTATIONS_DIR) {
        if !file_name.ends_with(".xml") {
            continue;
        }
        tally.annotation_files += 1;
        tally.annotated.push(base_name(file_name).to_string());

        let entry = format!("{ANNOTATIONS_DIR}/{file_name}");
        for name in voc_object_names(data, &entry)? {
            let count = counts.entry(name.clone()).or_insert(0);
            if *count == 0 {
                order.push(name);
            }
            *count += 1;
        }
    }

    tally.labels = order
        .into_iter()
        .map(|label| {
            let count = counts.get(&label).copied().unwrap_or(0);
            LabelCount { label, count }
        })
        .collect();
    Ok(tally)
}

fn voc_object_names(data: &[u8], entry: &str) -> Result<Vec<String>, MoonlabelError> {
    let xml = std::str::from_utf8(data).map_err(|source| MoonlabelError::VocXmlParse {
        entry: entry.to_string(),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    let document = roxmltree::Document::parse(xml).map_err(|source| MoonlabelError::VocXmlParse {
        entry: entry.to_string(),
        message: source.to_string(),
    })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(MoonlabelError::VocXmlParse {
            entry: entry.to_string(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
        .map(|object| {
            object
                .children()
                .find(|child| child.is_element() && child.tag_name().name() == "name")
                .map(|name| name.text().unwrap_or_default().to_owned())
                .ok_or_else(|| MoonlabelError::VocXmlParse {
                    entry: entry.to_string(),
                    message: "missing <name> in <object>".to_string(),
                })
        })
        .collect()
}

// ============================================================================
// COCO
// ============================================================================

fn tally_coco(contents: &ArchiveContents) -> Result<Tally, MoonlabelError> {
    let raw = contents.file(COCO_JSON).unwrap_or_default();
    let dataset: CocoDataset =
        serde_json::from_slice(raw).map_err(MoonlabelError::CocoJsonParse)?;

    let mut counts: HashMap<u64, usize> = HashMap::new();
    for annotation in &dataset.annotations {
        *counts.entry(annotation.category_id).or_insert(0) += 1;
    }

    Ok(Tally {
        annotation_files: 1,
        labels: dataset
            .categories
            .iter()
            .map(|category| LabelCount {
                label: category.name.clone(),
                count: counts.get(&category.id).copied().unwrap_or(0),
            })
            .collect(),
        annotated: dataset
            .images
            .into_iter()
            .map(|image| image.file_name)
            .collect(),
    })
}

// ============================================================================
// Captions
// ============================================================================

fn tally_captions(contents: &ArchiveContents) -> Tally {
    let annotated: Vec<String> = contents
        .files_in(CAPTIONS_DIR)
        .map(|(file_name, _)| base_name(file_name).to_string())
        .collect();

    Tally {
        annotation_files: annotated.len(),
        labels: Vec::new(),
        annotated,
    }
}
