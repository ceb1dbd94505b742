mod common;

use moonlabel::ir::{Batch, Detection, ExportFormat, ImageFile, ImageResult};
use moonlabel::{export, ExportOptions, ExportRequest, MoonlabelError};

fn batch() -> Batch {
    Batch::Detections(vec![
        ImageResult::new(
            common::bmp_image("a.bmp", 100, 100),
            vec![Detection::new("cat", 0.5, 0.5, 0.2, 0.3)],
        ),
        ImageResult::new(
            common::bmp_image("b.bmp", 64, 32),
            vec![
                Detection::new("dog", 0.75, 0.5, 0.5, 0.5),
                Detection::new("cat", 0.5, 0.5, 1.0, 1.0),
            ],
        ),
    ])
}

fn export_voc(batch: Batch) -> Result<Vec<u8>, MoonlabelError> {
    let request = ExportRequest::new(ExportFormat::Voc, batch, ExportOptions::default())?;
    Ok(export(&request, None)?.archive)
}

#[derive(Debug, PartialEq)]
struct VocObject {
    name: String,
    corners: [i64; 4],
}

fn objects(xml: &str) -> Vec<VocObject> {
    let doc = roxmltree::Document::parse(xml).expect("parse voc xml");
    doc.descendants()
        .filter(|n| n.has_tag_name("object"))
        .map(|object| {
            let text = |tag: &str| -> String {
                object
                    .descendants()
                    .find(|n| n.has_tag_name(tag))
                    .and_then(|n| n.text())
                    .expect("tag present")
                    .to_string()
            };
            let coord = |tag: &str| text(tag).parse::<i64>().expect("integer coordinate");
            VocObject {
                name: text("name"),
                corners: [coord("xmin"), coord("ymin"), coord("xmax"), coord("ymax")],
            }
        })
        .collect()
}

#[test]
fn one_document_per_image() {
    let archive = export_voc(batch()).expect("export voc");
    assert_eq!(
        common::entry_names(&archive),
        [
            "images/",
            "annotations/",
            "images/a.bmp",
            "images/b.bmp",
            "annotations/a.xml",
            "annotations/b.xml",
        ]
    );
}

#[test]
fn boxes_are_rounded_pixel_corners() {
    let archive = export_voc(batch()).expect("export voc");

    let a = objects(&common::entry_text(&archive, "annotations/a.xml"));
    assert_eq!(
        a,
        [VocObject {
            name: "cat".into(),
            corners: [40, 35, 60, 65],
        }]
    );

    let b = objects(&common::entry_text(&archive, "annotations/b.xml"));
    assert_eq!(
        b,
        [
            VocObject {
                name: "dog".into(),
                corners: [32, 8, 64, 24],
            },
            VocObject {
                name: "cat".into(),
                corners: [0, 0, 64, 32],
            },
        ]
    );
}

#[test]
fn document_records_image_size_and_name() {
    let archive = export_voc(batch()).expect("export voc");
    let xml = common::entry_text(&archive, "annotations/b.xml");
    let doc = roxmltree::Document::parse(&xml).expect("parse voc xml");

    let text = |tag: &str| {
        doc.descendants()
            .find(|n| n.has_tag_name(tag))
            .and_then(|n| n.text())
    };
    assert_eq!(text("filename"), Some("b.bmp"));
    assert_eq!(text("width"), Some("64"));
    assert_eq!(text("height"), Some("32"));
    assert_eq!(text("difficult"), Some("0"));
}

#[test]
fn unreadable_image_fails_the_whole_export() {
    let mut results = match batch() {
        Batch::Detections(results) => results,
        Batch::Captions(_) => unreachable!(),
    };
    results.push(ImageResult::new(
        ImageFile::new("broken.jpg", b"not an image".to_vec()),
        Vec::new(),
    ));

    let err = export_voc(Batch::Detections(results)).unwrap_err();
    assert!(
        matches!(err, MoonlabelError::ImageDimensions { ref file_name, .. } if file_name == "broken.jpg"),
        "unexpected error: {err}"
    );
}

#[test]
fn zero_size_box_keeps_a_degenerate_region() {
    let batch = Batch::Detections(vec![ImageResult::new(
        common::bmp_image("a.bmp", 10, 10),
        vec![Detection::new("dot", 0.3, 0.7, 0.0, 0.0)],
    )]);
    let archive = export_voc(batch).expect("export voc");

    let a = objects(&common::entry_text(&archive, "annotations/a.xml"));
    assert_eq!(
        a,
        [VocObject {
            name: "dot".into(),
            corners: [3, 7, 3, 7],
        }]
    );
}
