//! Batch-wide label registry.
//!
//! YOLO label files and COCO annotations refer to labels by integer index,
//! and the same indices are written into `data.yaml` and the COCO
//! `categories` list. The registry is the single place those indices come
//! from, so it is rebuilt from scratch for every export.

use std::collections::HashMap;

use super::model::ImageResult;

/// Ordered mapping from label string to zero-based index.
///
/// Indices are assigned in first-seen order: images in batch order, then
/// detections in the order the backend returned them. The mapping is a
/// bijection onto `0..len()`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelIndex {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl LabelIndex {
    /// Scans every detection of the batch and registers each new label.
    pub fn build<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a ImageResult>,
    {
        Self::from_labels(
            results
                .into_iter()
                .flat_map(|result| result.detections.iter().map(|det| det.label.as_str())),
        )
    }

    /// Registers labels from an arbitrary sequence, keeping the first occurrence.
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = Self::default();
        for label in labels {
            index.insert(label);
        }
        index
    }

    fn insert(&mut self, label: &str) -> usize {
        if let Some(&idx) = self.lookup.get(label) {
            return idx;
        }
        let idx = self.names.len();
        self.names.push(label.to_owned());
        self.lookup.insert(label.to_owned(), idx);
        idx
    }

    /// Index of `label`, or `None` if it never appeared in the batch.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.lookup.get(label).copied()
    }

    /// Labels in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(index, label)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx, name.as_str()))
    }
}
