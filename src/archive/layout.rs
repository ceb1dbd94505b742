//! Archive layout: folder names and the file names images get inside it.
//!
//! Annotation paths are derived from image base names (`a.jpg` becomes
//! `labels/a.txt`), so two uploads named `a.jpg` and `a.png` would fight
//! over the same label file. [`resolve_file_names`] settles every such
//! conflict before anything is encoded.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::encode::base_name;
use crate::error::MoonlabelError;
use crate::ir::ExportFormat;

pub const IMAGES_DIR: &str = "images";
pub const LABELS_DIR: &str = "labels";
pub const ANNOTATIONS_DIR: &str = "annotations";
pub const CAPTIONS_DIR: &str = "captions";
pub const DATA_YAML: &str = "data.yaml";
pub const COCO_JSON: &str = "annotations.json";

/// Suggested file name for a downloaded archive.
pub const ARCHIVE_FILE_NAME: &str = "dataset.zip";

const FALLBACK_FILE_NAME: &str = "image";

/// Folders a format's archive contains, in the order they are written.
pub fn format_dirs(format: ExportFormat) -> &'static [&'static str] {
    match format {
        ExportFormat::Yolo => &[IMAGES_DIR, LABELS_DIR],
        ExportFormat::Voc => &[IMAGES_DIR, ANNOTATIONS_DIR],
        ExportFormat::Coco => &[IMAGES_DIR],
        ExportFormat::Caption => &[IMAGES_DIR, CAPTIONS_DIR],
    }
}

/// What to do when two images of a batch would share archive paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CollisionPolicy {
    /// Later images are renamed `name (1).ext`, `name (2).ext`, ...
    #[default]
    Rename,
    /// The later image replaces the earlier one, which is left out.
    Overwrite,
    /// The export fails with [`MoonlabelError::DuplicateFileName`].
    Error,
}

/// Reduces an uploaded name to a bare file name safe to place in the archive.
///
/// Directory components (with either separator) are dropped, so nothing can
/// escape the `images/` folder.
pub fn sanitize_file_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    match last {
        "" | "." | ".." => FALLBACK_FILE_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Assigns every image of a batch its archive file name.
///
/// Returns `(batch index, archive name)` pairs in batch order. Two names
/// collide when they are equal or share a base name. Under
/// [`CollisionPolicy::Overwrite`] the earlier images of a collision are
/// missing from the result.
pub fn resolve_file_names<'a, I>(
    names: I,
    policy: CollisionPolicy,
) -> Result<Vec<(usize, String)>, MoonlabelError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut slots: Vec<Option<(usize, String)>> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut by_base: HashMap<String, usize> = HashMap::new();

    for (idx, raw) in names.into_iter().enumerate() {
        let name = sanitize_file_name(raw);
        let conflicts = conflicting_slots(&name, &by_name, &by_base);

        let resolved = if conflicts.is_empty() {
            name
        } else {
            match policy {
                CollisionPolicy::Error => {
                    return Err(MoonlabelError::DuplicateFileName { file_name: name });
                }
                CollisionPolicy::Rename => {
                    let renamed = next_free_name(&name, &by_name, &by_base);
                    warn!(original = %name, renamed = %renamed, "renamed colliding image");
                    renamed
                }
                CollisionPolicy::Overwrite => {
                    for slot in conflicts {
                        if let Some((_, dropped)) = slots[slot].take() {
                            warn!(file = %dropped, replaced_by = %name, "overwrote colliding image");
                            by_name.remove(&dropped);
                            by_base.remove(base_name(&dropped));
                        }
                    }
                    name
                }
            }
        };

        let slot = slots.len();
        by_name.insert(resolved.clone(), slot);
        by_base.insert(base_name(&resolved).to_string(), slot);
        slots.push(Some((idx, resolved)));
    }

    Ok(slots.into_iter().flatten().collect())
}

fn conflicting_slots(
    name: &str,
    by_name: &HashMap<String, usize>,
    by_base: &HashMap<String, usize>,
) -> Vec<usize> {
    let mut conflicts = Vec::new();
    if let Some(&slot) = by_name.get(name) {
        conflicts.push(slot);
    }
    if let Some(&slot) = by_base.get(base_name(name)) {
        if !conflicts.contains(&slot) {
            conflicts.push(slot);
        }
    }
    conflicts
}

fn next_free_name(
    name: &str,
    by_name: &HashMap<String, usize>,
    by_base: &HashMap<String, usize>,
) -> String {
    let base = base_name(name);
    let ext = &name[base.len()..];

    let mut counter = 1usize;
    loop {
        let candidate = format!("{base} ({counter}){ext}");
        if conflicting_slots(&candidate, by_name, by_base).is_empty() {
            return candidate;
        }
        counter += 1;
    }
}

/// True if every name is distinct and no two share a base name.
pub fn names_are_unique<'a, I>(names: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen_names = HashSet::new();
    let mut seen_bases = HashSet::new();
    names
        .into_iter()
        .all(|name| seen_names.insert(name) && seen_bases.insert(base_name(name)))
}
