#![allow(dead_code)]

use moonlabel::ir::{Batch, Detection, ImageFile, ImageResult};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

use crate::common;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Labels with characters that need escaping in XML and YAML.
pub fn arb_label() -> BoxedStrategy<String> {
    "[a-z&'<>][a-z0-9 &'<>]{0,10}".boxed()
}

/// A small pool of labels, so that batches repeat them.
pub fn arb_label_pool(max: usize) -> BoxedStrategy<Vec<String>> {
    prop::collection::vec(arb_label(), 1..=max).boxed()
}

pub fn arb_detection(labels: Vec<String>) -> BoxedStrategy<Detection> {
    (
        prop::sample::select(labels),
        0.0f64..=1.0,
        0.0f64..=1.0,
        0.0f64..=1.0,
        0.0f64..=1.0,
    )
        .prop_map(|(label, cx, cy, w, h)| Detection::new(label, cx, cy, w, h))
        .boxed()
}

/// Detection batches of BMP images with unique file names.
pub fn arb_detection_batch(max_images: usize, max_detections: usize) -> BoxedStrategy<Batch> {
    arb_label_pool(4)
        .prop_flat_map(move |labels| {
            prop::collection::vec(
                (
                    1u32..=32,
                    1u32..=32,
                    prop::collection::vec(arb_detection(labels.clone()), 0..=max_detections),
                ),
                1..=max_images,
            )
        })
        .prop_map(|images| {
            Batch::Detections(
                images
                    .into_iter()
                    .enumerate()
                    .map(|(idx, (width, height, detections))| {
                        ImageResult::new(
                            ImageFile::new(
                                format!("img_{idx}.bmp"),
                                common::bmp_bytes(width, height),
                            ),
                            detections,
                        )
                    })
                    .collect(),
            )
        })
        .boxed()
}

/// Upload-like file names: few stems and extensions, optional directories.
pub fn arb_file_names(max: usize) -> BoxedStrategy<Vec<String>> {
    prop::collection::vec(
        (
            prop::option::of(prop::sample::select(vec!["dir/", "a\\b\\", "../"])),
            prop::sample::select(vec!["a", "b", "a (1)", "photo"]),
            prop::sample::select(vec![".jpg", ".png", ".JPG", ""]),
        )
            .prop_map(|(dir, stem, ext)| format!("{}{stem}{ext}", dir.unwrap_or(""))),
        0..=max,
    )
    .boxed()
}
